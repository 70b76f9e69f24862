//! End-to-end tests for the identity bridge gateway live under `tests/`.
