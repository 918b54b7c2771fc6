use axum::{Json, Router, http::StatusCode, routing::post};
use log::info;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::data::{Assignments, SchedulingInput, SchedulingOutput, SectionId, TimeslotId};
use crate::error::ScheduleError;
use crate::graph::SectionGraph;
use crate::inspect::{self, CurrentConflicts, RoomsAndConflicts};
use crate::solver;

type HandlerError = (StatusCode, String);

fn bad_request(e: ScheduleError) -> HandlerError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

/// Proposed move of one section, evaluated against a roster snapshot.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeslotQuery {
    #[serde(flatten)]
    pub input: SchedulingInput,
    pub section: SectionId,
    pub timeslot: TimeslotId,
    #[serde(default)]
    pub assignments: Assignments,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionQuery {
    #[serde(flatten)]
    pub input: SchedulingInput,
    pub section: SectionId,
    #[serde(default)]
    pub assignments: Assignments,
}

async fn solve_handler(
    Json(input): Json<SchedulingInput>,
) -> Result<Json<SchedulingOutput>, HandlerError> {
    solver::schedule(&input).map(Json).map_err(bad_request)
}

async fn conflicts_and_rooms_handler(
    Json(query): Json<TimeslotQuery>,
) -> Result<Json<RoomsAndConflicts>, HandlerError> {
    let graph = SectionGraph::build(&query.input).map_err(bad_request)?;
    inspect::rooms_and_conflicts(&graph, &query.section, &query.timeslot, &query.assignments)
        .map(Json)
        .map_err(bad_request)
}

async fn current_conflicts_handler(
    Json(query): Json<SectionQuery>,
) -> Result<Json<CurrentConflicts>, HandlerError> {
    let graph = SectionGraph::build(&query.input).map_err(bad_request)?;
    inspect::current_conflicts(&graph, &query.section, &query.assignments)
        .map(Json)
        .map_err(bad_request)
}

pub fn router() -> Router {
    Router::new()
        .route("/v1/schedule/solve", post(solve_handler))
        .route(
            "/v1/sections/conflicts-and-rooms",
            post(conflicts_and_rooms_handler),
        )
        .route(
            "/v1/sections/current-conflicts",
            post(current_conflicts_handler),
        )
}

pub async fn run_server(config: &ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await
}
