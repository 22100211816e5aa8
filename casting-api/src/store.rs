use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{Actor, ActorPatch, Movie, MoviePatch, NewActor, NewMovie};

#[derive(Default)]
struct Tables {
    actors: BTreeMap<u64, Actor>,
    movies: BTreeMap<u64, Movie>,
    last_actor_id: u64,
    last_movie_id: u64,
}

/// In-memory actor and movie storage. Ids are assigned sequentially and
/// never reused; listings are ordered by id.
#[derive(Clone, Default)]
pub struct CastingStore {
    tables: Arc<RwLock<Tables>>,
}

impl CastingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list_actors(&self) -> Vec<Actor> {
        self.tables.read().await.actors.values().cloned().collect()
    }

    pub async fn get_actor(&self, id: u64) -> Option<Actor> {
        self.tables.read().await.actors.get(&id).cloned()
    }

    pub async fn create_actor(&self, new: NewActor) -> Actor {
        let mut tables = self.tables.write().await;
        tables.last_actor_id += 1;
        let actor = Actor {
            id: tables.last_actor_id,
            name: new.name,
            age: new.age,
            gender: new.gender,
        };
        tables.actors.insert(actor.id, actor.clone());
        actor
    }

    /// Apply the fields present in `patch`. `None` if the actor does not exist.
    pub async fn update_actor(&self, id: u64, patch: ActorPatch) -> Option<Actor> {
        let mut tables = self.tables.write().await;
        let actor = tables.actors.get_mut(&id)?;
        if let Some(name) = patch.name {
            actor.name = name;
        }
        if let Some(age) = patch.age {
            actor.age = age;
        }
        if let Some(gender) = patch.gender {
            actor.gender = gender;
        }
        Some(actor.clone())
    }

    pub async fn delete_actor(&self, id: u64) -> Option<Actor> {
        self.tables.write().await.actors.remove(&id)
    }

    pub async fn list_movies(&self) -> Vec<Movie> {
        self.tables.read().await.movies.values().cloned().collect()
    }

    pub async fn get_movie(&self, id: u64) -> Option<Movie> {
        self.tables.read().await.movies.get(&id).cloned()
    }

    pub async fn create_movie(&self, new: NewMovie) -> Movie {
        let mut tables = self.tables.write().await;
        tables.last_movie_id += 1;
        let movie = Movie {
            id: tables.last_movie_id,
            title: new.title,
            country: new.country,
            release_date: new.release_date,
        };
        tables.movies.insert(movie.id, movie.clone());
        movie
    }

    pub async fn update_movie(&self, id: u64, patch: MoviePatch) -> Option<Movie> {
        let mut tables = self.tables.write().await;
        let movie = tables.movies.get_mut(&id)?;
        if let Some(title) = patch.title {
            movie.title = title;
        }
        if let Some(country) = patch.country {
            movie.country = country;
        }
        if let Some(release_date) = patch.release_date {
            movie.release_date = release_date;
        }
        Some(movie.clone())
    }

    pub async fn delete_movie(&self, id: u64) -> Option<Movie> {
        self.tables.write().await.movies.remove(&id)
    }
}
