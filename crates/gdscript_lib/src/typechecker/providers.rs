//! Runtime type providers.
//!
//! The resolver never hard-codes engine knowledge; it asks a chain of
//! [`RuntimeTypeProvider`]s. The composite provider queries its children in
//! priority order and returns the first non-null answer, so project-declared
//! classes can shadow nothing and autoloads sit behind the `class_name`
//! registry exactly as documented.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Property,
    Method,
    Signal,
    Constant,
    EnumValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub ty: Option<Type>,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    pub return_type: Option<Type>,
    pub parameters: Vec<ParamInfo>,
    /// Accepts any number of trailing arguments (e.g. `print`).
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub base_type: Option<String>,
    pub members: Vec<MemberInfo>,
    pub is_built_in: bool,
}

impl TypeInfo {
    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// The interface every type source implements. All queries are by name;
/// `None` means "not mine", letting the composite fall through.
pub trait RuntimeTypeProvider: Send + Sync {
    fn is_known_type(&self, name: &str) -> bool {
        self.get_type_info(name).is_some()
    }

    fn get_type_info(&self, name: &str) -> Option<TypeInfo>;

    /// A member declared directly on `type_name` (no base-chain walk; the
    /// composite provider does that).
    fn get_member(&self, type_name: &str, member: &str) -> Option<MemberInfo> {
        self.get_type_info(type_name)?.member(member).cloned()
    }

    fn get_base_type(&self, name: &str) -> Option<String> {
        self.get_type_info(name)?.base_type
    }

    fn get_global_function(&self, name: &str) -> Option<MemberInfo> {
        let _ = name;
        None
    }

    /// Resolve a global identifier (a `class_name`, an autoload, a global
    /// constant) to the type of the value it denotes.
    fn get_global_class(&self, name: &str) -> Option<Type> {
        let _ = name;
        None
    }

    fn is_built_in(&self, identifier: &str) -> bool {
        let _ = identifier;
        false
    }

    fn get_all_types(&self) -> HashSet<String>;
}

/// Scene-derived node types: answers what `$Path/To/Node` is in the scene
/// that owns a script. Fed by the external scene-file parser.
pub trait SceneTypeSource: Send + Sync {
    fn node_type(&self, scene: Option<&str>, path: &str) -> Option<Type>;
}

/// In-memory scene map keyed by scene path, then node path.
#[derive(Debug, Clone, Default)]
pub struct SceneTypeMap {
    scenes: HashMap<String, HashMap<String, String>>,
}

impl SceneTypeMap {
    pub fn new() -> SceneTypeMap {
        SceneTypeMap::default()
    }

    pub fn insert(&mut self, scene: impl Into<String>, path: impl Into<String>, ty: impl Into<String>) {
        self.scenes
            .entry(scene.into())
            .or_default()
            .insert(path.into(), ty.into());
    }
}

impl SceneTypeSource for SceneTypeMap {
    fn node_type(&self, scene: Option<&str>, path: &str) -> Option<Type> {
        let scene = self.scenes.get(scene?)?;
        scene.get(path).map(|name| Type::named(name.clone()))
    }
}

// ---- composite ---------------------------------------------------------

/// Priority-ordered provider chain; first non-null answer wins.
#[derive(Clone, Default)]
pub struct CompositeProvider {
    providers: Vec<Arc<dyn RuntimeTypeProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Arc<dyn RuntimeTypeProvider>>) -> CompositeProvider {
        CompositeProvider { providers }
    }

    pub fn push(&mut self, provider: Arc<dyn RuntimeTypeProvider>) {
        self.providers.push(provider);
    }

    /// Member lookup that walks the base-type chain across all providers.
    /// A visited set keeps inheritance cycles finite.
    pub fn member_on_chain(&self, type_name: &str, member: &str) -> Option<MemberInfo> {
        let mut visited = HashSet::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                return None;
            }
            if let Some(found) = self.get_member(&name, member) {
                return Some(found);
            }
            current = self.get_base_type(&name);
        }
        None
    }

    /// `source` may be used where `target` is expected.
    pub fn is_assignable_to(&self, source: &Type, target: &Type) -> bool {
        if target.is_variant() || source.is_variant() {
            return true;
        }
        if source == target {
            return true;
        }
        // null is assignable to any reference (non-value) type
        if matches!(source, Type::Null) {
            return !target.is_numeric() && !matches!(target, Type::Named(n) if n == "bool");
        }
        // numeric widening
        if source == &Type::int() && target == &Type::float() {
            return true;
        }
        // untyped containers accept their typed variants and vice versa
        match (source, target) {
            (Type::Array(_), Type::Array(None)) | (Type::Array(None), Type::Array(_)) => {
                return true
            }
            (Type::Dictionary(_), Type::Dictionary(None))
            | (Type::Dictionary(None), Type::Dictionary(_)) => return true,
            _ => {}
        }
        // walk the inheritance chain of the source
        let target_name = target.name();
        let mut visited = HashSet::new();
        let mut current = Some(source.name());
        while let Some(name) = current {
            if name == target_name {
                return true;
            }
            if !visited.insert(name.clone()) {
                return false;
            }
            current = self.get_base_type(&name);
        }
        false
    }
}

impl RuntimeTypeProvider for CompositeProvider {
    fn get_type_info(&self, name: &str) -> Option<TypeInfo> {
        self.providers.iter().find_map(|p| p.get_type_info(name))
    }

    fn get_member(&self, type_name: &str, member: &str) -> Option<MemberInfo> {
        self.providers
            .iter()
            .find_map(|p| p.get_member(type_name, member))
    }

    fn get_base_type(&self, name: &str) -> Option<String> {
        self.providers.iter().find_map(|p| p.get_base_type(name))
    }

    fn get_global_function(&self, name: &str) -> Option<MemberInfo> {
        self.providers
            .iter()
            .find_map(|p| p.get_global_function(name))
    }

    fn get_global_class(&self, name: &str) -> Option<Type> {
        self.providers
            .iter()
            .find_map(|p| p.get_global_class(name))
    }

    fn is_built_in(&self, identifier: &str) -> bool {
        self.providers.iter().any(|p| p.is_built_in(identifier))
    }

    fn get_all_types(&self) -> HashSet<String> {
        let mut all = HashSet::new();
        for provider in &self.providers {
            all.extend(provider.get_all_types());
        }
        all
    }
}

// ---- project class registry --------------------------------------------

/// A class declared with `class_name` somewhere in the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectClass {
    pub name: String,
    pub base: Option<String>,
    pub path: String,
    pub members: Vec<MemberInfo>,
}

/// The project-wide `class_name` registry, installed once per analysis
/// batch and read-only while tasks run.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ProjectClass>,
    by_path: HashMap<String, String>,
}

impl ClassRegistry {
    pub fn new() -> ClassRegistry {
        ClassRegistry::default()
    }

    pub fn insert(&mut self, class: ProjectClass) {
        self.by_path.insert(class.path.clone(), class.name.clone());
        self.classes.insert(class.name.clone(), class);
    }

    pub fn remove_path(&mut self, path: &str) {
        if let Some(name) = self.by_path.remove(path) {
            self.classes.remove(&name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProjectClass> {
        self.classes.get(name)
    }

    pub fn class_at_path(&self, path: &str) -> Option<&ProjectClass> {
        self.by_path.get(path).and_then(|name| self.classes.get(name))
    }

    pub fn path_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.path.as_str())
    }
}

impl RuntimeTypeProvider for ClassRegistry {
    fn get_type_info(&self, name: &str) -> Option<TypeInfo> {
        let class = self.classes.get(name)?;
        Some(TypeInfo {
            base_type: class.base.clone(),
            members: class.members.clone(),
            is_built_in: false,
        })
    }

    fn get_global_class(&self, name: &str) -> Option<Type> {
        self.classes.get(name).map(|c| Type::named(c.name.clone()))
    }

    fn get_all_types(&self) -> HashSet<String> {
        self.classes.keys().cloned().collect()
    }
}

/// Autoload singletons: project-configured node instances addressable by a
/// global identifier.
#[derive(Debug, Clone, Default)]
pub struct AutoloadProvider {
    autoloads: HashMap<String, Type>,
}

impl AutoloadProvider {
    pub fn new() -> AutoloadProvider {
        AutoloadProvider::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.autoloads.insert(name.into(), ty);
    }
}

impl RuntimeTypeProvider for AutoloadProvider {
    fn get_type_info(&self, _name: &str) -> Option<TypeInfo> {
        None
    }

    fn get_global_class(&self, name: &str) -> Option<Type> {
        self.autoloads.get(name).cloned()
    }

    fn get_all_types(&self) -> HashSet<String> {
        HashSet::new()
    }
}

// ---- built-in engine table ----------------------------------------------

fn param(name: &str, ty: Type) -> ParamInfo {
    ParamInfo {
        name: name.into(),
        ty: Some(ty),
        has_default: false,
    }
}

fn opt_param(name: &str, ty: Type) -> ParamInfo {
    ParamInfo {
        name: name.into(),
        ty: Some(ty),
        has_default: true,
    }
}

fn method(name: &str, parameters: Vec<ParamInfo>, ret: Type) -> MemberInfo {
    MemberInfo {
        name: name.into(),
        kind: MemberKind::Method,
        return_type: Some(ret),
        parameters,
        variadic: false,
    }
}

fn property(name: &str, ty: Type) -> MemberInfo {
    MemberInfo {
        name: name.into(),
        kind: MemberKind::Property,
        return_type: Some(ty),
        parameters: vec![],
        variadic: false,
    }
}

fn signal(name: &str, parameters: Vec<ParamInfo>) -> MemberInfo {
    MemberInfo {
        name: name.into(),
        kind: MemberKind::Signal,
        return_type: None,
        parameters,
        variadic: false,
    }
}

fn class(name: &str, base: Option<&str>, members: Vec<MemberInfo>) -> (String, TypeInfo) {
    (
        name.to_string(),
        TypeInfo {
            base_type: base.map(|b| b.to_string()),
            members,
            is_built_in: true,
        },
    )
}

static ENGINE_TYPES: Lazy<HashMap<String, TypeInfo>> = Lazy::new(|| {
    let int = Type::int;
    let float = Type::float;
    let boolean = Type::boolean;
    let string = Type::string;
    let variant = || Type::Variant;
    let void = || Type::Void;

    let mut table: Vec<(String, TypeInfo)> = vec![
        class(
            "Object",
            None,
            vec![
                method("get_class", vec![], string()),
                method("is_class", vec![param("class", string())], boolean()),
                method(
                    "connect",
                    vec![
                        param("signal", Type::named("StringName")),
                        param("callable", Type::named("Callable")),
                    ],
                    int(),
                ),
                method(
                    "emit_signal",
                    vec![param("signal", Type::named("StringName"))],
                    int(),
                ),
                method("free", vec![], void()),
                method("get", vec![param("property", Type::named("StringName"))], variant()),
                method(
                    "set",
                    vec![
                        param("property", Type::named("StringName")),
                        param("value", variant()),
                    ],
                    void(),
                ),
            ],
        ),
        class("RefCounted", Some("Object"), vec![]),
        class(
            "Resource",
            Some("RefCounted"),
            vec![
                property("resource_path", string()),
                method("duplicate", vec![opt_param("subresources", boolean())], Type::named("Resource")),
            ],
        ),
        class(
            "PackedScene",
            Some("Resource"),
            vec![method("instantiate", vec![], Type::named("Node"))],
        ),
        class("Texture2D", Some("Resource"), vec![]),
        class("Script", Some("Resource"), vec![]),
        class("GDScript", Some("Script"), vec![method("new", vec![], variant())]),
        class(
            "Node",
            Some("Object"),
            vec![
                property("name", Type::named("StringName")),
                method("get_node", vec![param("path", Type::named("NodePath"))], Type::named("Node")),
                method(
                    "get_node_or_null",
                    vec![param("path", Type::named("NodePath"))],
                    Type::named("Node"),
                ),
                method("has_node", vec![param("path", Type::named("NodePath"))], boolean()),
                method("add_child", vec![param("node", Type::named("Node"))], void()),
                method("remove_child", vec![param("node", Type::named("Node"))], void()),
                method("get_parent", vec![], Type::named("Node")),
                method("get_children", vec![], Type::Array(Some(Box::new(Type::named("Node"))))),
                method("queue_free", vec![], void()),
                method("is_inside_tree", vec![], boolean()),
                method("get_tree", vec![], Type::named("SceneTree")),
                signal("ready", vec![]),
                signal("tree_entered", vec![]),
                signal("tree_exited", vec![]),
            ],
        ),
        class(
            "CanvasItem",
            Some("Node"),
            vec![
                property("visible", boolean()),
                method("show", vec![], void()),
                method("hide", vec![], void()),
                method("queue_redraw", vec![], void()),
            ],
        ),
        class(
            "Node2D",
            Some("CanvasItem"),
            vec![
                property("position", Type::named("Vector2")),
                property("global_position", Type::named("Vector2")),
                property("rotation", float()),
                property("scale", Type::named("Vector2")),
                method("look_at", vec![param("point", Type::named("Vector2"))], void()),
            ],
        ),
        class(
            "Node3D",
            Some("Node"),
            vec![
                property("position", Type::named("Vector3")),
                property("rotation", Type::named("Vector3")),
                property("scale", Type::named("Vector3")),
            ],
        ),
        class(
            "Control",
            Some("CanvasItem"),
            vec![
                property("size", Type::named("Vector2")),
                property("position", Type::named("Vector2")),
                method("grab_focus", vec![], void()),
            ],
        ),
        class(
            "Label",
            Some("Control"),
            vec![property("text", string())],
        ),
        class(
            "Button",
            Some("Control"),
            vec![property("text", string()), signal("pressed", vec![])],
        ),
        class(
            "Sprite2D",
            Some("Node2D"),
            vec![property("texture", Type::named("Texture2D"))],
        ),
        class(
            "PhysicsBody2D",
            Some("Node2D"),
            vec![],
        ),
        class(
            "CharacterBody2D",
            Some("PhysicsBody2D"),
            vec![
                property("velocity", Type::named("Vector2")),
                method("move_and_slide", vec![], boolean()),
                method("is_on_floor", vec![], boolean()),
            ],
        ),
        class(
            "Area2D",
            Some("Node2D"),
            vec![
                signal("body_entered", vec![param("body", Type::named("Node2D"))]),
                signal("body_exited", vec![param("body", Type::named("Node2D"))]),
            ],
        ),
        class(
            "Timer",
            Some("Node"),
            vec![
                property("wait_time", float()),
                property("one_shot", boolean()),
                method("start", vec![opt_param("time_sec", float())], void()),
                method("stop", vec![], void()),
                signal("timeout", vec![]),
            ],
        ),
        class(
            "AnimationPlayer",
            Some("Node"),
            vec![method(
                "play",
                vec![opt_param("name", Type::named("StringName"))],
                void(),
            )],
        ),
        class(
            "SceneTree",
            Some("Object"),
            vec![
                method("create_timer", vec![param("time_sec", float())], Type::named("SceneTreeTimer")),
                method("quit", vec![opt_param("exit_code", int())], void()),
                property("paused", boolean()),
            ],
        ),
        class(
            "SceneTreeTimer",
            Some("RefCounted"),
            vec![signal("timeout", vec![])],
        ),
        class(
            "Input",
            Some("Object"),
            vec![
                method(
                    "is_action_pressed",
                    vec![param("action", Type::named("StringName"))],
                    boolean(),
                ),
                method(
                    "is_action_just_pressed",
                    vec![param("action", Type::named("StringName"))],
                    boolean(),
                ),
                method(
                    "get_axis",
                    vec![
                        param("negative_action", Type::named("StringName")),
                        param("positive_action", Type::named("StringName")),
                    ],
                    float(),
                ),
                method(
                    "get_vector",
                    vec![
                        param("negative_x", Type::named("StringName")),
                        param("positive_x", Type::named("StringName")),
                        param("negative_y", Type::named("StringName")),
                        param("positive_y", Type::named("StringName")),
                    ],
                    Type::named("Vector2"),
                ),
            ],
        ),
        class(
            "ResourceLoader",
            Some("Object"),
            vec![method(
                "load",
                vec![param("path", string())],
                Type::named("Resource"),
            )],
        ),
        // value types
        class("int", None, vec![]),
        class("float", None, vec![]),
        class("bool", None, vec![]),
        class(
            "String",
            None,
            vec![
                method("length", vec![], int()),
                method("is_empty", vec![], boolean()),
                method(
                    "substr",
                    vec![param("from", int()), opt_param("len", int())],
                    string(),
                ),
                method(
                    "split",
                    vec![param("delimiter", string()), opt_param("allow_empty", boolean())],
                    Type::named("PackedStringArray"),
                ),
                method("begins_with", vec![param("text", string())], boolean()),
                method("ends_with", vec![param("text", string())], boolean()),
                method("contains", vec![param("what", string())], boolean()),
                method("find", vec![param("what", string()), opt_param("from", int())], int()),
                method(
                    "replace",
                    vec![param("what", string()), param("forwhat", string())],
                    string(),
                ),
                method("to_upper", vec![], string()),
                method("to_lower", vec![], string()),
                method("strip_edges", vec![opt_param("left", boolean()), opt_param("right", boolean())], string()),
                method("capitalize", vec![], string()),
                method("to_int", vec![], int()),
                method("to_float", vec![], float()),
            ],
        ),
        class("StringName", None, vec![]),
        class("NodePath", None, vec![method("get_name_count", vec![], int())]),
        class(
            "Callable",
            None,
            vec![
                method("call", vec![], variant()),
                method("is_valid", vec![], boolean()),
                method("bind", vec![], Type::named("Callable")),
            ],
        ),
        class(
            "Signal",
            None,
            vec![
                method("connect", vec![param("callable", Type::named("Callable"))], int()),
                method("emit", vec![], void()),
            ],
        ),
        class(
            "Vector2",
            None,
            vec![
                property("x", float()),
                property("y", float()),
                method("length", vec![], float()),
                method("normalized", vec![], Type::named("Vector2")),
                method("distance_to", vec![param("to", Type::named("Vector2"))], float()),
                method("dot", vec![param("with", Type::named("Vector2"))], float()),
                method("angle", vec![], float()),
                method(
                    "lerp",
                    vec![param("to", Type::named("Vector2")), param("weight", float())],
                    Type::named("Vector2"),
                ),
            ],
        ),
        class(
            "Vector2i",
            None,
            vec![property("x", int()), property("y", int())],
        ),
        class(
            "Vector3",
            None,
            vec![
                property("x", float()),
                property("y", float()),
                property("z", float()),
                method("length", vec![], float()),
                method("normalized", vec![], Type::named("Vector3")),
            ],
        ),
        class(
            "Vector3i",
            None,
            vec![property("x", int()), property("y", int()), property("z", int())],
        ),
        class(
            "Vector4",
            None,
            vec![property("x", float()), property("y", float()), property("z", float()), property("w", float())],
        ),
        class(
            "Color",
            None,
            vec![
                property("r", float()),
                property("g", float()),
                property("b", float()),
                property("a", float()),
                method(
                    "lerp",
                    vec![param("to", Type::named("Color")), param("weight", float())],
                    Type::named("Color"),
                ),
            ],
        ),
        class("Rect2", None, vec![property("position", Type::named("Vector2")), property("size", Type::named("Vector2"))]),
        class("Transform2D", None, vec![property("origin", Type::named("Vector2"))]),
        class("Transform3D", None, vec![property("origin", Type::named("Vector3"))]),
        class(
            "Array",
            None,
            vec![
                method("size", vec![], int()),
                method("is_empty", vec![], boolean()),
                method("append", vec![param("value", variant())], void()),
                method("push_back", vec![param("value", variant())], void()),
                method("pop_back", vec![], variant()),
                method("front", vec![], variant()),
                method("back", vec![], variant()),
                method("has", vec![param("value", variant())], boolean()),
                method("find", vec![param("what", variant()), opt_param("from", int())], int()),
                method("clear", vec![], void()),
                method("sort", vec![], void()),
                method("sort_custom", vec![param("func", Type::named("Callable"))], void()),
                method("duplicate", vec![opt_param("deep", boolean())], Type::Array(None)),
                method("map", vec![param("method", Type::named("Callable"))], Type::Array(None)),
                method("filter", vec![param("method", Type::named("Callable"))], Type::Array(None)),
                method("reduce", vec![param("method", Type::named("Callable")), opt_param("accum", variant())], variant()),
            ],
        ),
        class(
            "Dictionary",
            None,
            vec![
                method("size", vec![], int()),
                method("is_empty", vec![], boolean()),
                method("has", vec![param("key", variant())], boolean()),
                method("keys", vec![], Type::Array(None)),
                method("values", vec![], Type::Array(None)),
                method("get", vec![param("key", variant()), opt_param("default", variant())], variant()),
                method("erase", vec![param("key", variant())], boolean()),
                method("clear", vec![], void()),
                method("duplicate", vec![opt_param("deep", boolean())], Type::Dictionary(None)),
                method("merge", vec![param("dictionary", Type::Dictionary(None)), opt_param("overwrite", boolean())], void()),
            ],
        ),
    ];

    for (name, element) in super::types::PACKED_ARRAY_ELEMENTS.iter() {
        table.push(class(
            name,
            None,
            vec![
                method("size", vec![], int()),
                method("is_empty", vec![], boolean()),
                method("append", vec![param("value", element.clone())], boolean()),
                method("has", vec![param("value", element.clone())], boolean()),
            ],
        ));
    }

    table.into_iter().collect()
});

static GLOBAL_FUNCTIONS: Lazy<HashMap<String, MemberInfo>> = Lazy::new(|| {
    let int = Type::int;
    let float = Type::float;
    let string = Type::string;
    let variant = || Type::Variant;
    let void = || Type::Void;

    let variadic = |name: &str, ret: Type| MemberInfo {
        name: name.into(),
        kind: MemberKind::Method,
        return_type: Some(ret),
        parameters: vec![],
        variadic: true,
    };

    let table = vec![
        variadic("print", void()),
        variadic("prints", void()),
        variadic("printerr", void()),
        variadic("print_debug", void()),
        variadic("push_error", void()),
        variadic("push_warning", void()),
        variadic("str", string()),
        variadic("range", Type::Array(Some(Box::new(int())))),
        variadic("min", variant()),
        variadic("max", variant()),
        method("len", vec![param("x", variant())], int()),
        method("abs", vec![param("x", variant())], variant()),
        method("clamp", vec![param("value", variant()), param("min", variant()), param("max", variant())], variant()),
        method("lerp", vec![param("from", variant()), param("to", variant()), param("weight", float())], variant()),
        method("lerpf", vec![param("from", float()), param("to", float()), param("weight", float())], float()),
        method("floor", vec![param("x", float())], float()),
        method("ceil", vec![param("x", float())], float()),
        method("round", vec![param("x", float())], float()),
        method("sqrt", vec![param("x", float())], float()),
        method("pow", vec![param("base", float()), param("exp", float())], float()),
        method("sin", vec![param("angle_rad", float())], float()),
        method("cos", vec![param("angle_rad", float())], float()),
        method("tan", vec![param("angle_rad", float())], float()),
        method("deg_to_rad", vec![param("deg", float())], float()),
        method("rad_to_deg", vec![param("rad", float())], float()),
        method("randf", vec![], float()),
        method("randi", vec![], int()),
        method("randi_range", vec![param("from", int()), param("to", int())], int()),
        method("randf_range", vec![param("from", float()), param("to", float())], float()),
        method("randomize", vec![], void()),
        method("typeof", vec![param("what", variant())], int()),
        method("is_instance_valid", vec![param("instance", variant())], Type::boolean()),
        method("load", vec![param("path", string())], Type::named("Resource")),
        method("preload", vec![param("path", string())], Type::named("Resource")),
        method("instance_from_id", vec![param("instance_id", int())], Type::named("Object")),
        method("get_stack", vec![], Type::Array(None)),
    ];

    table.into_iter().map(|m| (m.name.clone(), m)).collect()
});

static GLOBAL_CONSTANTS: Lazy<HashMap<String, Type>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("PI".to_string(), Type::float());
    table.insert("TAU".to_string(), Type::float());
    table.insert("INF".to_string(), Type::float());
    table.insert("NAN".to_string(), Type::float());
    table.insert("OK".to_string(), Type::int());
    table.insert("FAILED".to_string(), Type::int());
    table
});

/// The built-in engine surface: classes, value types, global functions and
/// global constants. The table is a curated core, not a full engine dump;
/// the provider chain lets richer sources sit in front of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    pub fn global_constant(&self, name: &str) -> Option<Type> {
        GLOBAL_CONSTANTS.get(name).cloned()
    }
}

impl RuntimeTypeProvider for BuiltinProvider {
    fn get_type_info(&self, name: &str) -> Option<TypeInfo> {
        ENGINE_TYPES.get(name).cloned()
    }

    fn get_member(&self, type_name: &str, member: &str) -> Option<MemberInfo> {
        ENGINE_TYPES.get(type_name)?.member(member).cloned()
    }

    fn get_base_type(&self, name: &str) -> Option<String> {
        ENGINE_TYPES.get(name)?.base_type.clone()
    }

    fn get_global_function(&self, name: &str) -> Option<MemberInfo> {
        GLOBAL_FUNCTIONS.get(name).cloned()
    }

    fn get_global_class(&self, name: &str) -> Option<Type> {
        if let Some(ty) = GLOBAL_CONSTANTS.get(name) {
            return Some(ty.clone());
        }
        // engine singletons addressed by class name (Input, ResourceLoader)
        if matches!(name, "Input" | "ResourceLoader") {
            return Some(Type::named(name));
        }
        None
    }

    fn is_built_in(&self, identifier: &str) -> bool {
        ENGINE_TYPES.contains_key(identifier)
            || GLOBAL_FUNCTIONS.contains_key(identifier)
            || GLOBAL_CONSTANTS.contains_key(identifier)
    }

    fn get_all_types(&self) -> HashSet<String> {
        ENGINE_TYPES.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite() -> CompositeProvider {
        CompositeProvider::new(vec![Arc::new(BuiltinProvider)])
    }

    #[test]
    fn test_base_chain() {
        let provider = composite();
        assert_eq!(provider.get_base_type("Sprite2D"), Some("Node2D".into()));
        assert_eq!(provider.get_base_type("Node2D"), Some("CanvasItem".into()));
        assert_eq!(provider.get_base_type("Object"), None);
    }

    #[test]
    fn test_member_on_chain_walks_bases() {
        let provider = composite();
        // queue_free is declared on Node, reachable from Sprite2D
        let member = provider.member_on_chain("Sprite2D", "queue_free").unwrap();
        assert_eq!(member.kind, MemberKind::Method);
        assert_eq!(member.return_type, Some(Type::Void));
    }

    #[test]
    fn test_assignability() {
        let provider = composite();
        assert!(provider.is_assignable_to(&Type::named("Sprite2D"), &Type::named("Node")));
        assert!(!provider.is_assignable_to(&Type::named("Node"), &Type::named("Sprite2D")));
        assert!(provider.is_assignable_to(&Type::int(), &Type::float()));
        assert!(!provider.is_assignable_to(&Type::float(), &Type::int()));
        assert!(provider.is_assignable_to(&Type::Null, &Type::named("Node")));
        assert!(!provider.is_assignable_to(&Type::Null, &Type::int()));
        assert!(provider.is_assignable_to(&Type::string(), &Type::Variant));
    }

    #[test]
    fn test_registry_shadows_nothing_but_answers_first() {
        let mut registry = ClassRegistry::new();
        registry.insert(ProjectClass {
            name: "Player".into(),
            base: Some("CharacterBody2D".into()),
            path: "res://player.gd".into(),
            members: vec![],
        });
        let provider = CompositeProvider::new(vec![
            Arc::new(registry),
            Arc::new(BuiltinProvider),
        ]);
        assert!(provider.is_known_type("Player"));
        assert!(provider.is_assignable_to(&Type::named("Player"), &Type::named("Node")));
    }

    #[test]
    fn test_cycle_in_base_chain_terminates() {
        let mut registry = ClassRegistry::new();
        registry.insert(ProjectClass {
            name: "A".into(),
            base: Some("B".into()),
            path: "res://a.gd".into(),
            members: vec![],
        });
        registry.insert(ProjectClass {
            name: "B".into(),
            base: Some("A".into()),
            path: "res://b.gd".into(),
            members: vec![],
        });
        let provider = CompositeProvider::new(vec![Arc::new(registry)]);
        assert!(provider.member_on_chain("A", "missing").is_none());
        assert!(!provider.is_assignable_to(&Type::named("A"), &Type::named("Node")));
    }

    #[test]
    fn test_global_functions_and_constants() {
        let provider = BuiltinProvider;
        assert!(provider.get_global_function("print").unwrap().variadic);
        assert_eq!(provider.global_constant("PI"), Some(Type::float()));
        assert!(provider.is_built_in("Vector2"));
        assert!(!provider.is_built_in("definitely_not_builtin"));
    }

    #[test]
    fn test_scene_type_map() {
        let mut map = SceneTypeMap::new();
        map.insert("res://main.tscn", "Player/Sprite2D", "Sprite2D");
        assert_eq!(
            map.node_type(Some("res://main.tscn"), "Player/Sprite2D"),
            Some(Type::named("Sprite2D"))
        );
        assert_eq!(map.node_type(None, "Player/Sprite2D"), None);
    }
}
