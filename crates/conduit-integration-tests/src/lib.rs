//! Cross-crate scenarios live under `tests/`.
