//! Application layer containing the channel matching and reconciliation logic.
//!
//! `ChannelRouter` is the entry point a host drives. It composes the candidate
//! pool, the failover orchestrator and the submission gateway for matching, and
//! hands out the evidence coordinator and the redirect flow for the two ways an
//! order is settled.

pub mod candidate_pool;
pub mod engine;
pub mod evidence;
pub mod failover;
pub mod gateway;
pub mod redirect;
