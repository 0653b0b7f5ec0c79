//! # txprop Services
//!
//! Repositories and services that run on top of the txprop coordinator.
//!
//! This crate provides:
//! - Records ([`Member`], [`Log`], [`Order`]) encoded as CBOR
//! - Repositories, each with its own configurable transaction boundary
//! - [`MemberService`]: joins a member and writes an audit log entry
//! - [`OrderService`]: places an order and settles its payment
//!
//! Every call takes the caller's [`txprop_core::Session`] explicitly; no
//! transaction state is kept anywhere else.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod model;
mod repository;
mod service;

pub use error::{BusinessRule, ServiceError, ServiceResult};
pub use model::{Log, Member, Order, OrderId, PayStatus};
pub use repository::{
    LogRepository, MemberRepository, OrderRepository, LOG_FAILURE_MARKER, LOG_TABLE,
    MEMBER_TABLE, ORDER_TABLE,
};
pub use service::{
    MemberService, OrderService, TransactionBoundaries, USERNAME_NOT_ENOUGH_MONEY,
    USERNAME_SYSTEM_FAILURE,
};
