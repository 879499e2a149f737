//! Behavioural scenarios for a full image run.

mod lifecycle;
