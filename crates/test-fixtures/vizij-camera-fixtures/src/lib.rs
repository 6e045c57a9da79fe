use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use vizij_camera_core::{
    CameraNode, CameraPose, Config, FieldOfViewNode, OffsetNode, ParamId, RigAsset,
    RigDefinition, SetPoseNode, Transition, TransitionDef, Value,
};

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/camera/manifest.json");
    serde_json::from_str(raw).expect("camera fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    rigs: HashMap<String, String>,
    assets: HashMap<String, String>,
    configs: HashMap<String, String>,
}

/// One node of a fixture rig. Nodes listed in a rig form a chain: each node is
/// the only child of the one before it.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NodeFixture {
    SetPose {
        position: [f32; 3],
        #[serde(default)]
        field_of_view: Option<f32>,
    },
    Offset {
        offset: [f32; 3],
        #[serde(default)]
        param: Option<String>,
    },
    FieldOfView { param: String, default_fov: f32 },
}

#[derive(Debug, Deserialize)]
struct RigFixture {
    name: String,
    #[serde(default)]
    asset: Option<String>,
    #[serde(default)]
    nodes: Vec<NodeFixture>,
    #[serde(default)]
    parameters: HashMap<String, Value>,
    #[serde(default)]
    combination: Vec<String>,
    #[serde(default)]
    enter_transitions: Vec<TransitionDef>,
    #[serde(default)]
    exit_transitions: Vec<TransitionDef>,
}

#[derive(Debug, Deserialize)]
struct AssetFixture {
    name: String,
    #[serde(default)]
    enter_transitions: Vec<TransitionDef>,
    #[serde(default)]
    exit_transitions: Vec<TransitionDef>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a String> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn build_chain(rig: &str, nodes: Vec<NodeFixture>) -> Result<Option<Arc<dyn CameraNode>>> {
    let mut child: Option<Arc<dyn CameraNode>> = None;
    for node in nodes.into_iter().rev() {
        let built: Arc<dyn CameraNode> = match node {
            NodeFixture::SetPose {
                position,
                field_of_view,
            } => {
                let mut pose = CameraPose::at(position);
                if let Some(fov) = field_of_view {
                    pose.field_of_view = fov;
                }
                let mut n = SetPoseNode::new(pose);
                if let Some(c) = child.take() {
                    n = n.with_child(c);
                }
                Arc::new(n)
            }
            NodeFixture::Offset { offset, param } => {
                let mut n = OffsetNode::new(offset);
                if let Some(p) = param {
                    n = n.driven_by(ParamId::new(p));
                }
                if let Some(c) = child.take() {
                    n = n.with_child(c);
                }
                Arc::new(n)
            }
            NodeFixture::FieldOfView { param, default_fov } => {
                if child.is_some() {
                    bail!("rig '{rig}': field_of_view nodes cannot have children");
                }
                Arc::new(FieldOfViewNode::new(ParamId::new(param), default_fov))
            }
        };
        child = Some(built);
    }
    Ok(child)
}

pub mod rigs {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.rigs.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.rigs, "rig", name)?;
        read_to_string(rel)
    }

    /// Build a fresh rig definition; combination members are loaded recursively.
    pub fn load(name: &str) -> Result<Arc<RigDefinition>> {
        let rel = lookup(&MANIFEST.rigs, "rig", name)?;
        let fixture: RigFixture = load_json(rel)?;

        let mut rig = if fixture.combination.is_empty() {
            RigDefinition::new(fixture.name.clone())
        } else {
            let subs = fixture
                .combination
                .iter()
                .map(|sub| load(sub))
                .collect::<Result<Vec<_>>>()?;
            RigDefinition::combine(fixture.name.clone(), subs)
        };
        if let Some(root) = build_chain(&fixture.name, fixture.nodes)? {
            rig = rig.with_root(root);
        }
        for (id, value) in fixture.parameters {
            rig = rig.with_parameter(ParamId::new(id), value);
        }
        for def in fixture.enter_transitions {
            rig = rig.with_enter_transition(Transition::from(def));
        }
        for def in fixture.exit_transitions {
            rig = rig.with_exit_transition(Transition::from(def));
        }
        if let Some(asset) = &fixture.asset {
            rig = rig.with_asset(super::assets::load(asset)?);
        }
        Ok(Arc::new(rig))
    }
}

pub mod assets {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.assets.keys().cloned().collect()
    }

    pub fn load(name: &str) -> Result<Arc<RigAsset>> {
        let rel = lookup(&MANIFEST.assets, "asset", name)?;
        let fixture: AssetFixture = load_json(rel)?;
        let mut asset = RigAsset::new(fixture.name);
        for def in fixture.enter_transitions {
            asset = asset.with_enter_transition(Transition::from(def));
        }
        for def in fixture.exit_transitions {
            asset = asset.with_exit_transition(Transition::from(def));
        }
        Ok(Arc::new(asset))
    }
}

pub mod configs {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.configs.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.configs, "config", name)?;
        read_to_string(rel)
    }

    pub fn load(name: &str) -> Result<Config> {
        let text = json(name)?;
        Config::from_json_str(&text).with_context(|| format!("invalid camera config '{name}'"))
    }
}
