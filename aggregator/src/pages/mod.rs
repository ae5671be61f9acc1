//! The two page aggregations the routing layer drives.

mod detail;
mod home;

pub use detail::ContentDetail;
pub use home::{GenreSection, HomeScreen};

use crate::error::AggregationError;
use crate::executor::AggregationExecutor;
use crate::outcome::CompositeResult;
use serde_json::Value;
use std::sync::Arc;
use upstream::client::UpstreamCaller;

/// Entry points for the page-level aggregations. One instance lives for
/// the whole process; graphs are built fresh per call.
pub struct Pages {
    executor: AggregationExecutor,
}

impl Pages {
    pub fn new(caller: Arc<dyn UpstreamCaller>, max_in_flight: usize) -> Self {
        Self {
            executor: AggregationExecutor::new(caller).with_max_in_flight(max_in_flight),
        }
    }

    /// Raw composite for the home screen, for callers that assemble their
    /// own view.
    pub async fn execute_home_screen_aggregation(
        &self,
        user_id: &str,
    ) -> Result<CompositeResult, AggregationError> {
        let graph = home::graph(user_id)?;
        self.executor.execute(graph).await
    }

    pub async fn home_screen(&self, user_id: &str) -> Result<HomeScreen, AggregationError> {
        let composite = self.execute_home_screen_aggregation(user_id).await?;
        Ok(HomeScreen::from_composite(&composite))
    }

    /// Raw composite for the content detail page.
    pub async fn execute_content_detail_aggregation(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<CompositeResult, AggregationError> {
        let graph = detail::graph(user_id, content_id)?;
        self.executor.execute(graph).await
    }

    pub async fn content_detail(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<ContentDetail, AggregationError> {
        let composite = self
            .execute_content_detail_aggregation(user_id, content_id)
            .await?;
        Ok(ContentDetail::from_composite(&composite))
    }
}

/// Path segments interpolate ids that upstreams serve as either strings or
/// numbers.
pub(crate) fn id_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregationError;
    use crate::testutils::{MockUpstream, ok, status};
    use serde_json::json;
    use upstream::client::UpstreamClient;
    use upstream::config::UpstreamsConfig;

    async fn pages_for(
        content: &MockUpstream,
        users: &MockUpstream,
        interactions: &MockUpstream,
    ) -> Pages {
        let config = UpstreamsConfig {
            content_url: content.url(),
            users_url: users.url(),
            interactions_url: interactions.url(),
            http_timeout_secs: 2,
            get_retries: 0,
        };
        let client = UpstreamClient::new(&config).unwrap();
        Pages::new(Arc::new(client), 8)
    }

    #[tokio::test]
    async fn test_home_screen_degrades_failed_sections() {
        let content = MockUpstream::start(vec![
            (
                "GET /generos",
                ok(json!([
                    {"id": "g1", "nombre": "Drama"},
                    {"id": "g2", "nombre": "Comedia"},
                ])),
            ),
            (
                "GET /generos/g1/contenidos",
                ok(json!([{"id": "c1", "titulo": "The Long Night"}])),
            ),
            ("GET /generos/g2/contenidos", status(500, json!("boom"))),
        ])
        .await;
        let users = MockUpstream::start(vec![]).await;
        let interactions = MockUpstream::start(vec![
            ("GET /usuarios/u1/recomendaciones", status(500, json!("boom"))),
            ("GET /contenido/tendencias", status(500, json!("boom"))),
            (
                "GET /usuarios/u1/historial",
                ok(json!([{"id": "c9", "titulo": "Seen Before"}])),
            ),
            (
                "GET /usuarios/u1/listaPersonalizada",
                ok(json!([{"id": "c3", "titulo": "Saved"}])),
            ),
        ])
        .await;

        let pages = pages_for(&content, &users, &interactions).await;
        let home = pages.home_screen("u1").await.unwrap();

        assert!(home.recommendations.is_empty());
        assert!(home.trending.is_empty());
        assert_eq!(home.history.len(), 1);
        assert_eq!(home.personal_list.len(), 1);

        assert_eq!(home.genre_sections.len(), 2);
        assert_eq!(home.genre_sections[0].name, "Drama");
        assert_eq!(home.genre_sections[0].contents.len(), 1);
        assert_eq!(home.genre_sections[1].name, "Comedia");
        assert!(home.genre_sections[1].contents.is_empty());

        assert_eq!(
            home.message,
            "Could not load personalized recommendations. | \
             Could not load trending titles. | \
             Could not load contents for genre Comedia."
        );
    }

    #[tokio::test]
    async fn test_home_screen_aborts_without_genres() {
        let content =
            MockUpstream::start(vec![("GET /generos", status(503, json!("down")))]).await;
        let users = MockUpstream::start(vec![]).await;
        let interactions = MockUpstream::start(vec![
            ("GET /usuarios/u1/recomendaciones", ok(json!([]))),
            ("GET /contenido/tendencias", ok(json!([]))),
            ("GET /usuarios/u1/historial", ok(json!([]))),
            ("GET /usuarios/u1/listaPersonalizada", ok(json!([]))),
        ])
        .await;

        let pages = pages_for(&content, &users, &interactions).await;
        let err = pages.home_screen("u1").await.unwrap_err();

        match err {
            AggregationError::RequiredNodeFailed { node, .. } => assert_eq!(node, "genres"),
            other => panic!("expected required-node failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_content_detail_missing_metadata_fails() {
        let content = MockUpstream::start(vec![(
            "GET /contenidos/missing",
            status(404, json!("not found")),
        )])
        .await;
        let users = MockUpstream::start(vec![]).await;
        let interactions =
            MockUpstream::start(vec![("GET /usuarios/u1/historial", ok(json!([])))]).await;

        let pages = pages_for(&content, &users, &interactions).await;
        let err = pages.content_detail("u1", "missing").await.unwrap_err();

        match err {
            AggregationError::RequiredNodeFailed { node, source } => {
                assert_eq!(node, "content");
                assert_eq!(source.status().map(|s| s.as_u16()), Some(404));
            }
            other => panic!("expected required-node failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_movie_detail_resolves_names_and_records_view() {
        let content = MockUpstream::start(vec![
            (
                "GET /contenidos/c1",
                ok(json!({
                    "id": "c1",
                    "titulo": "The Long Night",
                    "tipoContenido": "Pelicula",
                    "idGenero": "g1",
                    "idDirector": "d1",
                    "idSubtitulosContenido": "sub1",
                    "idDoblajeContenido": "dub1",
                })),
            ),
            ("GET /generos/g1", ok(json!({"id": "g1", "nombre": "Drama"}))),
            ("GET /directores/d1", ok(json!({"id": "d1", "nombre": "Ada Vale"}))),
            ("GET /contenidos/c1/reparto", ok(json!([{"id": "a1", "nombre": "Lee"}]))),
            ("GET /contenidos/sub1/subtitulos", ok(json!(["es", "en"]))),
            ("GET /contenidos/dub1/doblajes", ok(json!(["es"]))),
        ])
        .await;
        let users = MockUpstream::start(vec![]).await;
        let interactions = MockUpstream::start(vec![
            ("GET /usuarios/u1/historial", ok(json!([]))),
            ("POST /usuarios/u1/historial/c1", ok(json!("recorded"))),
        ])
        .await;

        let pages = pages_for(&content, &users, &interactions).await;
        let detail = pages.content_detail("u1", "c1").await.unwrap();

        assert_eq!(detail.genre_name.as_deref(), Some("Drama"));
        assert_eq!(detail.director_name.as_deref(), Some("Ada Vale"));
        assert!(detail.seasons.is_empty());
        assert!(detail.episodes.is_empty());
        assert_eq!(detail.cast.len(), 1);
        assert_eq!(detail.subtitles, vec![json!("es"), json!("en")]);
        assert_eq!(detail.message, crate::outcome::ALL_SECTIONS_LOADED);

        // Not in history yet, so the view was recorded fire-and-forget.
        assert!(
            interactions
                .requests()
                .contains(&"POST /usuarios/u1/historial/c1".to_string())
        );
    }

    #[tokio::test]
    async fn test_series_detail_tolerates_missing_episode_director() {
        let content = MockUpstream::start(vec![
            (
                "GET /contenidos/s1",
                ok(json!({
                    "id": "s1",
                    "titulo": "Orbit",
                    "tipoContenido": "Serie",
                    "idGenero": "g1",
                    "idSubtitulosContenido": "sub1",
                    "idDoblajeContenido": "dub1",
                })),
            ),
            ("GET /generos/g1", ok(json!({"id": "g1", "nombre": "Drama"}))),
            (
                "GET /series/s1",
                ok(json!({
                    "Temporadas": [
                        {
                            "numeroTemporada": 1,
                            "Episodios": [
                                {"titulo": "Launch", "idDirector": "d1"},
                                {"titulo": "Apogee", "idDirector": "d404"},
                            ],
                        },
                        {
                            "numeroTemporada": 2,
                            "Episodios": [
                                {"titulo": "Reentry"},
                            ],
                        },
                    ],
                })),
            ),
            ("GET /directores/d1", ok(json!({"id": "d1", "nombre": "Ada Vale"}))),
            ("GET /directores/d404", status(404, json!("unknown director"))),
            ("GET /contenidos/s1/reparto", ok(json!([]))),
            ("GET /contenidos/sub1/subtitulos", ok(json!([]))),
            ("GET /contenidos/dub1/doblajes", ok(json!([]))),
        ])
        .await;
        let users = MockUpstream::start(vec![]).await;
        let interactions = MockUpstream::start(vec![
            (
                "GET /usuarios/u1/historial",
                ok(json!([{"id": "s1", "titulo": "Orbit"}])),
            ),
        ])
        .await;

        let pages = pages_for(&content, &users, &interactions).await;
        let detail = pages.content_detail("u1", "s1").await.unwrap();

        assert_eq!(detail.seasons.len(), 2);
        assert_eq!(detail.episodes.len(), 3);
        assert_eq!(detail.episodes[0]["director"], "Ada Vale");
        assert!(detail.episodes[1].get("director").is_none());
        assert!(detail.episodes[2].get("director").is_none());
        assert_eq!(
            detail.message,
            "Could not load the director for episode Apogee."
        );

        // Already present in history, so no view is recorded.
        assert!(
            !interactions
                .requests()
                .iter()
                .any(|r| r.starts_with("POST"))
        );
    }

    #[test]
    fn test_id_str_accepts_strings_and_numbers() {
        assert_eq!(id_str(&json!("g1")).as_deref(), Some("g1"));
        assert_eq!(id_str(&json!(7)).as_deref(), Some("7"));
        assert_eq!(id_str(&json!(null)), None);
        assert_eq!(id_str(&json!({"id": 1})), None);
    }
}
