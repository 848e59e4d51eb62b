//! End-to-end tests across the loader, store, query engine and agent.

mod support;
