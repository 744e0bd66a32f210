//! Test suites for the port.

mod support;
mod unit;
