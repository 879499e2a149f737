//! Step definitions, fixtures, and scenarios for image runs.

mod bdd_steps;
mod scenarios;
mod test_helpers;
