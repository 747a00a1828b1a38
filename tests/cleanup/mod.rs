//! Step definitions, fixtures and scenarios for cleanup behaviour.

mod bdd_steps;
mod scenarios;
mod test_helpers;
