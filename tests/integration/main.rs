// End-to-end tests on a generated tools application

mod build_tests;
mod fixture;
mod pwa_tests;
mod runtime_tests;
