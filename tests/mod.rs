//! Workspace integration tests, exercising the public APIs end to end.
