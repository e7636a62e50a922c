#![warn(missing_docs, clippy::missing_docs_in_private_items)]
// None of the tests are seen by the linter, so none of the utilities are marked
// as used. But docs don't generate for the below if they are `#[cfg(test)]`.
// This is a compromise.
#![allow(dead_code)]

//! Tests for hellogae that work by talking to a running server over HTTP.
//!
//! The report served on `/` is the whole public surface, so tests here assert
//! on its exact labels and their order, the way someone comparing reports
//! from different deployments would read them.
//!
//! This is structured as a separate crate so that it produces a single test
//! binary instead of one test per file like would happen if this were
//! `hellogae/tests/...`. This improves compilation and test times.
//!
//! The primary tool used by tests is [`hellogae_test`], which starts a mock
//! platform, sets up the application for testing, and provides helpers to
//! inspect the state of the app. It then calls the test function that is
//! passed to it, providing the above tools as an argument.
//!
//! ```
//! use hellogae_integration_tests::{TestingTools, hellogae_test_macro};
//! use hellogae_web::DeploymentMode;
//! use reqwest::StatusCode;
//!
//! #[hellogae_test_macro(|config| config.deployment = DeploymentMode::Local)]
//! async fn local_report_works(TestingTools { test_client, .. }: TestingTools) {
//!    let response = test_client
//!        .get("/")
//!        .send()
//!        .await
//!        .expect("failed to execute request");
//!
//!    assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

// Lets `#[hellogae_test_macro]` name this crate the same way from inside it
// and from doc tests.
extern crate self as hellogae_integration_tests;

mod entry_point;
mod failures;
mod logging;
mod report;
mod utils;

pub use crate::utils::{
    logging::{LogWatcher, TracingJsonEvent},
    test_tools::{
        hellogae_test, serve_platform, BridgeMocks, TestConfig, TestReqwestClient, TestingTools,
    },
};

pub use hellogae_integration_tests_macro::hellogae_test as hellogae_test_macro;
