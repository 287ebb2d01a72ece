//! End-to-end tests for Living Library live under `tests/`. Shared fakes are
//! in `tests/common`.
