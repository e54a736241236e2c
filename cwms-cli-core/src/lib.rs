#![doc = "cwms-cli-core: core logic library for cwms-cli."]

//! This crate holds the network-free parts of the blob tooling: resolving a
//! directory into upload targets, deriving blob ids, and driving a sequential
//! bulk upload against an injected [`contract::Uploader`].
//!
//! # Usage
//! Build a [`config::BulkUploadConfig`], call [`resolve::resolve_targets`],
//! then hand the targets to [`bulk_upload::upload_all`].

pub mod bulk_upload;
pub mod config;
pub mod contract;
pub mod error;
pub mod media;
pub mod resolve;
