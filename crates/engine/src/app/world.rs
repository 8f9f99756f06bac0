use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::content::LevelDef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(value: [f32; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

/// The scene side of the game: player transform, camera confinement and
/// scene loading.
pub trait WorldLink {
    fn player_position(&self) -> Vec3;
    fn set_player_position(&mut self, position: Vec3);
    fn map_boundary(&self) -> Option<String>;
    /// Returns `false` when no boundary with that name exists.
    fn set_map_boundary(&mut self, name: &str) -> bool;
    fn active_scene(&self) -> String;
    fn request_scene(&mut self, scene_name: &str);
}

/// In-memory world used by the console front-end and tests.
#[derive(Debug, Clone)]
pub struct HeadlessWorld {
    position: Vec3,
    boundary: Option<String>,
    boundaries: Vec<String>,
    scene: String,
}

impl HeadlessWorld {
    pub fn new(scene: impl Into<String>, boundaries: Vec<String>) -> Self {
        Self {
            position: Vec3::default(),
            boundary: boundaries.first().cloned(),
            boundaries,
            scene: scene.into(),
        }
    }

    pub fn from_level(level: &LevelDef) -> Self {
        let mut world = Self::new(level.scene_name.clone(), level.boundaries.clone());
        world.position = Vec3::from(level.player_spawn);
        world.boundary = Some(level.default_boundary.clone());
        world
    }
}

impl WorldLink for HeadlessWorld {
    fn player_position(&self) -> Vec3 {
        self.position
    }

    fn set_player_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn map_boundary(&self) -> Option<String> {
        self.boundary.clone()
    }

    fn set_map_boundary(&mut self, name: &str) -> bool {
        if !self.boundaries.iter().any(|known| known == name) {
            warn!(boundary = name, "map_boundary_not_found");
            return false;
        }
        self.boundary = Some(name.to_string());
        true
    }

    fn active_scene(&self) -> String {
        self.scene.clone()
    }

    fn request_scene(&mut self, scene_name: &str) {
        debug!(scene = scene_name, "scene_requested");
        self.scene = scene_name.to_string();
    }
}
