//! Client for a peer-to-peer exchange of tokenized assets: builds and signs
//! orders, publishes them through the directory service, and validates every
//! settlement instruction before it is allowed anywhere near the chain.

pub mod deployment;
pub mod directory;
pub mod flows;
pub mod ledger;

pub use {
    deployment::Deployment,
    flows::{Client, Error, ListRequest, OfferRequest},
};
