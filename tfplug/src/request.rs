//! Request and response types passed to provider callbacks
//!
//! Each callback gets the [`Context`] of the RPC that triggered it. Responses
//! carry [`Diagnostics`] instead of a `Result` so that warnings can travel
//! alongside a successful outcome.

use crate::context::Context;
use crate::types::{Config, Diagnostics, State};

#[derive(Clone)]
pub struct ConfigureRequest {
    pub context: Context,
    pub config: Config,
}

#[derive(Clone, Default)]
pub struct ConfigureResponse {
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct CreateRequest {
    pub context: Context,
    pub config: Config,
    pub planned_state: State,
}

#[derive(Clone)]
pub struct CreateResponse {
    pub state: State,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct ReadRequest {
    pub context: Context,
    pub current_state: State,
}

/// `state: None` tells Terraform the remote object is gone
#[derive(Clone)]
pub struct ReadResponse {
    pub state: Option<State>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct UpdateRequest {
    pub context: Context,
    pub config: Config,
    pub planned_state: State,
    pub current_state: State,
}

#[derive(Clone)]
pub struct UpdateResponse {
    pub state: State,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct DeleteRequest {
    pub context: Context,
    pub current_state: State,
}

#[derive(Clone, Default)]
pub struct DeleteResponse {
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct ImportRequest {
    pub context: Context,
    pub id: String,
}

#[derive(Clone)]
pub struct ImportResponse {
    pub state: Option<State>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct DataSourceReadRequest {
    pub context: Context,
    pub config: Config,
}

#[derive(Clone)]
pub struct DataSourceReadResponse {
    pub state: Option<State>,
    pub diagnostics: Diagnostics,
}
