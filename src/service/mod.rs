//! # External Services
//!
//! Clients for the collaborating services around the relay core. Today
//! that is the HTTPS login/negotiation endpoint that hands out the real
//! server address and session key material.

pub mod negotiate;
