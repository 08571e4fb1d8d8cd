pub mod hubspot;
pub mod normalizer;
pub mod oauth;
pub mod salesforce;
pub mod service;
