//! End-to-end parsing behavior: losslessness, never-fail recovery, and the
//! structural shape of parsed declarations.

use gdscript_lib::parser::{parse, NodeKind, Slot};

fn member_kinds(source: &str) -> Vec<NodeKind> {
    let outcome = parse(source);
    let body = outcome
        .tree
        .slot_node(outcome.tree.root(), Slot::Body)
        .expect("file root has no body");
    outcome
        .tree
        .child_nodes(body)
        .map(|n| outcome.tree.kind(n).clone())
        .collect()
}

#[test]
fn roundtrip_of_a_realistic_file() {
    let source = concat!(
        "class_name Player\n",
        "extends CharacterBody2D\n",
        "\n",
        "signal died\n",
        "\n",
        "const MAX_SPEED := 300.0\n",
        "@export var jump_strength: float = 500.0\n",
        "@onready var sprite = $Body/Sprite2D\n",
        "\n",
        "var _health: int = 3\n",
        "\n",
        "\n",
        "func _physics_process(delta: float) -> void:\n",
        "\tvelocity.y += delta * 980.0  # gravity\n",
        "\tif Input.is_action_just_pressed(\"jump\") and is_on_floor():\n",
        "\t\tvelocity.y = -jump_strength\n",
        "\tmove_and_slide()\n",
        "\n",
        "func take_damage(amount: int) -> void:\n",
        "\t_health -= amount\n",
        "\tif _health <= 0:\n",
        "\t\tdied.emit()\n",
        "\t\tqueue_free()\n",
    );
    let outcome = parse(source);
    assert_eq!(outcome.tree.serialize(), source);
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
}

#[test]
fn scenario_class_level_variable() {
    // `var x = 10` at class scope: exactly one declaration
    let kinds = member_kinds("var x = 10\n");
    assert_eq!(kinds, vec![NodeKind::VariableDecl]);
}

#[test]
fn scenario_method_statement_counts() {
    let source = "func test():\n\tif true:\n\t\tprint(1)\n\tprint(2)\n";
    let outcome = parse(source);
    assert!(outcome.diagnostics.is_empty());

    let body = outcome
        .tree
        .slot_node(outcome.tree.root(), Slot::Body)
        .unwrap();
    let method = outcome.tree.child_nodes(body).next().unwrap();
    let method_body = outcome.tree.slot_node(method, Slot::Body).unwrap();
    let statements: Vec<_> = outcome.tree.child_nodes(method_body).collect();
    assert_eq!(statements.len(), 2, "method must have two direct statements");

    let if_branch = outcome.tree.child_nodes(statements[0]).next().unwrap();
    let branch_body = outcome.tree.slot_node(if_branch, Slot::Body).unwrap();
    assert_eq!(
        outcome.tree.child_nodes(branch_body).count(),
        1,
        "the if branch holds exactly one statement"
    );
}

#[test]
fn parse_accepts_arbitrary_bytes() {
    let inputs = [
        "\u{0}\u{1}\u{2}\u{3}",
        "ÿïñvàlid ütf cödepoints £$€",
        "var \"=)(/&%$§\n\t\t\t\tfunc",
        "\r\r\r",
        "\"\"\"never closed",
        "func f(:\n\t\tpass",
        "match match match:",
    ];
    for input in inputs {
        let outcome = parse(input);
        assert_eq!(
            outcome.tree.serialize(),
            input,
            "lossless even for {input:?}"
        );
    }
}

#[test]
fn parse_is_deterministic() {
    let source = "extends Node\nvar a = [1, 2, 3]\nfunc f():\n\treturn a\n";
    let first = parse(source);
    let second = parse(source);
    assert_eq!(first.tree, second.tree);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn reparse_after_serialize_is_structurally_equal() {
    let source = "func f():\n\tfor i in range(3):\n\t\tprint(i)\n";
    let first = parse(source);
    let second = parse(&first.tree.serialize());
    assert_eq!(first.tree, second.tree);
    assert!(second.diagnostics.is_empty());
}

#[test]
fn attributes_and_members_in_order() {
    let kinds = member_kinds(
        "tool\nclass_name Weapon\nextends Node2D\nsignal fired\nenum Kind { MELEE, RANGED }\nconst DAMAGE = 5\nvar durability = 100\nfunc fire():\n\tfired.emit()\nclass Ammo:\n\tvar count = 0\n",
    );
    assert_eq!(
        kinds,
        vec![
            NodeKind::ToolAttr,
            NodeKind::ClassNameAttr,
            NodeKind::ExtendsAttr,
            NodeKind::SignalDecl,
            NodeKind::EnumDecl,
            NodeKind::VariableDecl,
            NodeKind::VariableDecl,
            NodeKind::MethodDecl,
            NodeKind::ClassDecl,
        ]
    );
}

#[test]
fn annotations_share_a_line_with_their_declaration() {
    let kinds = member_kinds("@export var health := 10\n");
    assert_eq!(kinds, vec![NodeKind::Annotation, NodeKind::VariableDecl]);
}

#[test]
fn string_quote_styles_are_preserved() {
    let source = "var a = 'single'\nvar b = \"double\"\nvar c = '''triple\nline'''\nvar d = \"\"\"other\"\"\"\n";
    let outcome = parse(source);
    assert_eq!(outcome.tree.serialize(), source);
}
