//! Content catalog service: request constructors for the page graphs and a
//! typed API for search and catalog administration passthroughs.

use crate::client::{self, Service, UpstreamCaller, UpstreamError, UpstreamRequest};
use crate::types::{Director, Genre};
use serde_json::Value;
use std::sync::Arc;

pub fn genres() -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, "/generos")
}

pub fn genre(genre_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/generos/{genre_id}"))
}

pub fn genre_contents(genre_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/generos/{genre_id}/contenidos"))
}

pub fn metadata(content_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/contenidos/{content_id}"))
}

pub fn cast(content_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/contenidos/{content_id}/reparto"))
}

pub fn subtitles(subtitle_group_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(
        Service::Content,
        format!("/contenidos/{subtitle_group_id}/subtitulos"),
    )
}

pub fn dubbings(dubbing_group_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(
        Service::Content,
        format!("/contenidos/{dubbing_group_id}/doblajes"),
    )
}

/// Season/episode listing for series content.
pub fn series_seasons(series_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/series/{series_id}"))
}

pub fn director(director_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/directores/{director_id}"))
}

pub fn search_contents(query: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/contenidos/{query}/buscar"))
}

pub fn search_actors(query: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/contenidos/{query}/actores"))
}

pub fn actor_contents(actor_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Content, format!("/actores/{actor_id}/contenidos"))
}

#[derive(Clone)]
pub struct ContentApi {
    caller: Arc<dyn UpstreamCaller>,
}

impl ContentApi {
    pub fn new(caller: Arc<dyn UpstreamCaller>) -> Self {
        Self { caller }
    }

    pub async fn genres(&self) -> Result<Vec<Genre>, UpstreamError> {
        let payload = self.caller.call(&genres()).await?;
        client::decode(Service::Content, payload)
    }

    pub async fn director(&self, director_id: &str) -> Result<Director, UpstreamError> {
        let payload = self.caller.call(&director(director_id)).await?;
        client::decode(Service::Content, payload)
    }

    pub async fn search_contents(&self, query: &str) -> Result<Value, UpstreamError> {
        self.caller.call(&search_contents(query)).await
    }

    pub async fn search_actors(&self, query: &str) -> Result<Value, UpstreamError> {
        self.caller.call(&search_actors(query)).await
    }

    pub async fn actor_contents(&self, actor_id: &str) -> Result<Value, UpstreamError> {
        self.caller.call(&actor_contents(actor_id)).await
    }

    // Catalog administration passthroughs. Bodies are forwarded as-is and
    // upstream errors surface verbatim.

    pub async fn all_contents(&self) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::get(Service::Content, "/contenidos"))
            .await
    }

    pub async fn all_movies(&self) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::get(Service::Content, "/todopeliculas"))
            .await
    }

    pub async fn all_series(&self) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::get(Service::Content, "/todoseries"))
            .await
    }

    pub async fn actors(&self) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::get(Service::Content, "/actores"))
            .await
    }

    pub async fn directors(&self) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::get(Service::Content, "/directores"))
            .await
    }

    pub async fn create_movie(&self, movie: Value) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::post(Service::Content, "/peliculas", Some(movie)))
            .await
    }

    pub async fn create_series(&self, series: Value) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::post(Service::Content, "/series", Some(series)))
            .await
    }

    pub async fn create_genre(&self, genre: Value) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::post(Service::Content, "/generos", Some(genre)))
            .await
    }

    pub async fn create_season(
        &self,
        series_id: &str,
        season: Value,
    ) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::post(
                Service::Content,
                format!("/contenidos/{series_id}/temporadas"),
                Some(season),
            ))
            .await
    }

    pub async fn create_episode(
        &self,
        series_id: &str,
        season_id: &str,
        episode: Value,
    ) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::post(
                Service::Content,
                format!("/contenidos/{series_id}/temporadas/{season_id}/episodios"),
                Some(episode),
            ))
            .await
    }

    pub async fn add_cast_member(
        &self,
        content_id: &str,
        actor_id: &str,
    ) -> Result<Value, UpstreamError> {
        self.caller
            .call(&UpstreamRequest::post(
                Service::Content,
                format!("/contenidos/{content_id}/reparto/{actor_id}"),
                None,
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_request_paths() {
        assert_eq!(genres().path, "/generos");
        assert_eq!(genre_contents("g1").path, "/generos/g1/contenidos");
        assert_eq!(metadata("c1").path, "/contenidos/c1");
        assert_eq!(series_seasons("s1").path, "/series/s1");
        assert_eq!(subtitles("sub1").path, "/contenidos/sub1/subtitulos");
        assert_eq!(director("d1").method, Method::GET);
    }
}
