//! Home screen aggregation.
//!
//! Four independent optional sections plus the genre list, which fans out
//! into one contents lookup per genre. Only the genre list is required:
//! without it no genre section can exist, while any other section
//! degrades to an empty list and a diagnostic.

use super::id_str;
use crate::error::AggregationError;
use crate::graph::{FailurePolicy, NodeId, RequestGraph};
use crate::outcome::CompositeResult;
use serde::Serialize;
use serde_json::Value;
use upstream::{content, interactions};

pub(super) const RECOMMENDATIONS: NodeId = "recommendations";
pub(super) const TRENDING: NodeId = "trending";
pub(super) const HISTORY: NodeId = "history";
pub(super) const GENRES: NodeId = "genres";
pub(super) const GENRE_CONTENTS: NodeId = "genre-contents";
pub(super) const PERSONAL_LIST: NodeId = "personal-list";

pub(super) fn graph(user_id: &str) -> Result<RequestGraph, AggregationError> {
    if user_id.trim().is_empty() {
        return Err(AggregationError::BadRequest("missing user id".to_string()));
    }

    let mut builder = RequestGraph::builder();

    let user = user_id.to_owned();
    builder.request(
        RECOMMENDATIONS,
        &[],
        FailurePolicy::degrade("Could not load personalized recommendations."),
        move |_| Some(interactions::recommendations(&user)),
    );

    builder.request(
        TRENDING,
        &[],
        FailurePolicy::degrade("Could not load trending titles."),
        |_| Some(interactions::trending()),
    );

    let user = user_id.to_owned();
    builder.request(
        HISTORY,
        &[],
        FailurePolicy::degrade("Could not load the viewing history."),
        move |_| Some(interactions::history(&user)),
    );

    builder.request(GENRES, &[], FailurePolicy::Abort, |_| Some(content::genres()));

    builder.fanout(
        GENRE_CONTENTS,
        GENRES,
        FailurePolicy::degrade_with(|genre| {
            let name = genre
                .and_then(|g| g.get("nombre"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!("Could not load contents for genre {name}.")
        }),
        |_, genre, _| {
            let id = id_str(genre.get("id")?)?;
            Some(content::genre_contents(&id))
        },
    );

    let user = user_id.to_owned();
    builder.request(
        PERSONAL_LIST,
        &[],
        FailurePolicy::degrade("Could not load the personal list."),
        move |_| Some(interactions::personal_list(&user)),
    );

    Ok(builder.build()?)
}

#[derive(Debug, Serialize)]
pub struct GenreSection {
    pub name: String,
    pub contents: Vec<Value>,
}

/// Page-ready home screen model. Failed or skipped sections render as
/// empty lists; the message carries the joined diagnostics.
#[derive(Debug, Serialize)]
pub struct HomeScreen {
    pub recommendations: Vec<Value>,
    pub trending: Vec<Value>,
    pub history: Vec<Value>,
    pub genre_sections: Vec<GenreSection>,
    pub personal_list: Vec<Value>,
    pub message: String,
}

impl HomeScreen {
    pub(super) fn from_composite(composite: &CompositeResult) -> Self {
        let genres = composite.sequence(GENRES);
        let contents = composite.group(GENRE_CONTENTS);

        let genre_sections = genres
            .iter()
            .enumerate()
            .map(|(i, genre)| {
                let name = genre
                    .get("nombre")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let contents = contents
                    .get(i)
                    .and_then(|outcome| outcome.payload())
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                GenreSection { name, contents }
            })
            .collect();

        Self {
            recommendations: composite.sequence(RECOMMENDATIONS),
            trending: composite.sequence(TRENDING),
            history: composite.sequence(HISTORY),
            genre_sections,
            personal_list: composite.sequence(PERSONAL_LIST),
            message: composite.summary(),
        }
    }
}
