//! Content detail aggregation.
//!
//! Everything hangs off the content metadata: genre and director lookups,
//! cast, subtitles and dubbings degrade individually, series content pulls
//! its season listing and fans out a director lookup per episode. A
//! trailing fire-and-forget node records the view in the watch history
//! when the content is not already there.

use super::id_str;
use crate::error::AggregationError;
use crate::graph::{Deps, FailurePolicy, NodeId, RequestGraph};
use crate::outcome::CompositeResult;
use serde::Serialize;
use serde_json::Value;
use upstream::{content, interactions};

pub(super) const CONTENT: NodeId = "content";
pub(super) const GENRE: NodeId = "genre";
pub(super) const MOVIE_DIRECTOR: NodeId = "movie-director";
pub(super) const SEASONS: NodeId = "seasons";
pub(super) const EPISODES: NodeId = "episodes";
pub(super) const EPISODE_DIRECTORS: NodeId = "episode-directors";
pub(super) const CAST: NodeId = "cast";
pub(super) const SUBTITLES: NodeId = "subtitles";
pub(super) const DUBBINGS: NodeId = "dubbings";
pub(super) const HISTORY: NodeId = "history";
pub(super) const RECORD_VIEW: NodeId = "record-view";

const MOVIE_KIND: &str = "Pelicula";

fn is_movie(metadata: &Value) -> bool {
    metadata.get("tipoContenido").and_then(Value::as_str) == Some(MOVIE_KIND)
}

fn metadata_of(deps: &Deps) -> Option<&Value> {
    deps.get(CONTENT)
}

pub(super) fn graph(user_id: &str, content_id: &str) -> Result<RequestGraph, AggregationError> {
    if user_id.trim().is_empty() {
        return Err(AggregationError::BadRequest("missing user id".to_string()));
    }
    if content_id.trim().is_empty() {
        return Err(AggregationError::BadRequest(
            "missing content id".to_string(),
        ));
    }

    let mut builder = RequestGraph::builder();

    let id = content_id.to_owned();
    builder.request(CONTENT, &[], FailurePolicy::Abort, move |_| {
        Some(content::metadata(&id))
    });

    builder.request(
        GENRE,
        &[CONTENT],
        FailurePolicy::degrade("Could not load the genre."),
        |deps| {
            let genre_id = id_str(metadata_of(deps)?.get("idGenero")?)?;
            Some(content::genre(&genre_id))
        },
    );

    builder.request(
        MOVIE_DIRECTOR,
        &[CONTENT],
        FailurePolicy::degrade("Could not load the director."),
        |deps| {
            let metadata = metadata_of(deps)?;
            if !is_movie(metadata) {
                return None;
            }
            let director_id = id_str(metadata.get("idDirector")?)?;
            Some(content::director(&director_id))
        },
    );

    builder.request(
        SEASONS,
        &[CONTENT],
        FailurePolicy::degrade("Could not load seasons and episodes."),
        |deps| {
            let metadata = metadata_of(deps)?;
            if is_movie(metadata) {
                return None;
            }
            let series_id = id_str(metadata.get("id")?)?;
            Some(content::series_seasons(&series_id))
        },
    );

    builder.transform(EPISODES, &[SEASONS], FailurePolicy::Ignore, |deps| {
        let mut episodes = Vec::new();
        if let Some(seasons) = deps
            .get(SEASONS)
            .and_then(|payload| payload.get("Temporadas"))
            .and_then(Value::as_array)
        {
            for season in seasons {
                if let Some(listed) = season.get("Episodios").and_then(Value::as_array) {
                    episodes.extend(listed.iter().cloned());
                }
            }
        }
        Ok(Value::Array(episodes))
    });

    builder.fanout(
        EPISODE_DIRECTORS,
        EPISODES,
        FailurePolicy::degrade_with(|episode| {
            let title = episode
                .and_then(|e| e.get("titulo"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!("Could not load the director for episode {title}.")
        }),
        |_, episode, _| {
            let director_id = id_str(episode.get("idDirector")?)?;
            Some(content::director(&director_id))
        },
    );

    builder.request(
        CAST,
        &[CONTENT],
        FailurePolicy::degrade("Could not load the cast."),
        |deps| {
            let id = id_str(metadata_of(deps)?.get("id")?)?;
            Some(content::cast(&id))
        },
    );

    builder.request(
        SUBTITLES,
        &[CONTENT],
        FailurePolicy::degrade("Could not load the subtitles."),
        |deps| {
            let group_id = id_str(metadata_of(deps)?.get("idSubtitulosContenido")?)?;
            Some(content::subtitles(&group_id))
        },
    );

    builder.request(
        DUBBINGS,
        &[CONTENT],
        FailurePolicy::degrade("Could not load the dubbings."),
        |deps| {
            let group_id = id_str(metadata_of(deps)?.get("idDoblajeContenido")?)?;
            Some(content::dubbings(&group_id))
        },
    );

    let user = user_id.to_owned();
    builder.request(HISTORY, &[], FailurePolicy::Ignore, move |_| {
        Some(interactions::history(&user))
    });

    // Write-after-read side effect, not part of the page's data needs.
    let user = user_id.to_owned();
    let id = content_id.to_owned();
    builder.request(
        RECORD_VIEW,
        &[CONTENT, HISTORY],
        FailurePolicy::Ignore,
        move |deps| {
            let already_seen = deps
                .get(HISTORY)
                .and_then(Value::as_array)
                .is_some_and(|history| {
                    history
                        .iter()
                        .any(|entry| entry.get("id").and_then(Value::as_str) == Some(id.as_str()))
                });
            if already_seen {
                return None;
            }
            Some(interactions::record_view(&user, &id))
        },
    );

    Ok(builder.build()?)
}

/// Page-ready content detail model. Sections that failed or were skipped
/// are absent or empty; episode objects gain a `director` field when the
/// per-episode lookup succeeded.
#[derive(Debug, Serialize)]
pub struct ContentDetail {
    pub metadata: Value,
    pub genre_name: Option<String>,
    pub director_name: Option<String>,
    pub seasons: Vec<Value>,
    pub episodes: Vec<Value>,
    pub cast: Vec<Value>,
    pub subtitles: Vec<Value>,
    pub dubbings: Vec<Value>,
    pub message: String,
}

impl ContentDetail {
    pub(super) fn from_composite(composite: &CompositeResult) -> Self {
        let metadata = composite.payload(CONTENT).cloned().unwrap_or(Value::Null);

        let genre_name = composite
            .payload(GENRE)
            .and_then(|genre| genre.get("nombre"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let director_name = composite
            .payload(MOVIE_DIRECTOR)
            .and_then(|director| director.get("nombre"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let seasons = composite
            .payload(SEASONS)
            .and_then(|payload| payload.get("Temporadas"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let directors = composite.group(EPISODE_DIRECTORS);
        let episodes = composite
            .sequence(EPISODES)
            .into_iter()
            .enumerate()
            .map(|(i, mut episode)| {
                let name = directors
                    .get(i)
                    .and_then(|outcome| outcome.payload())
                    .and_then(|director| director.get("nombre"))
                    .and_then(Value::as_str);
                if let (Some(name), Some(fields)) = (name, episode.as_object_mut()) {
                    fields.insert("director".to_string(), Value::String(name.to_string()));
                }
                episode
            })
            .collect();

        Self {
            metadata,
            genre_name,
            director_name,
            seasons,
            episodes,
            cast: composite.sequence(CAST),
            subtitles: composite.sequence(SUBTITLES),
            dubbings: composite.sequence(DUBBINGS),
            message: composite.summary(),
        }
    }
}
