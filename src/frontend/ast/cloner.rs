use indexmap::IndexMap;

use crate::{
    frontend::ast::{Label, NodeId, Program, Target},
    trace,
};

pub struct ClonedSubtree {
    pub root: NodeId,
    /// Original node to its copy.
    pub mapping: IndexMap<NodeId, NodeId>,
}

/// Deep-copies the subtree at `root` into the program's arena.
///
/// Control-flow edges between copied nodes are rewired to the copies, and case labels naming a
/// copied node follow it. Edges leaving the subtree are handed to `flow_out`, which picks the
/// target the copy should use instead. Source positions and node types are carried over.
/// Function nodes keep referring to the same entity.
pub fn clone_subtree(
    program: &mut Program,
    root: NodeId,
    mut flow_out: impl FnMut(&Label, &Target) -> Target,
) -> Option<ClonedSubtree> {
    let originals = program.ast.subtree(root);
    if originals.is_empty() {
        return None;
    }

    let base = program.ast.len();
    let mapping: IndexMap<NodeId, NodeId> = originals
        .iter()
        .enumerate()
        .map(|(offset, original)| (*original, NodeId::new(base + offset)))
        .collect();

    for original in &originals {
        let kind = program
            .ast
            .kind(*original)?
            .map_children(|child| mapping.get(&child).copied().unwrap_or(child));
        program.ast.add(kind);
    }

    for (original, copy) in &mapping {
        for (label, target) in program.control_flow.targets(*original) {
            let new_label = match label {
                Label::Case(case) => Label::Case(mapping.get(&case).copied().unwrap_or(case)),
                other => other,
            };
            let new_target = match target {
                Target::Node(node) => match mapping.get(&node) {
                    Some(mapped) => Target::Node(*mapped),
                    None => flow_out(&new_label, &target),
                },
                Target::ExceptionToExit => Target::ExceptionToExit,
            };
            program.control_flow.add(*copy, new_label, new_target);
        }

        if let Some(loc) = program.positions.get(*original).cloned() {
            program.positions.insert(*copy, loc);
        }
        if let Some(type_name) = program.node_types.get(original).cloned() {
            program.node_types.insert(*copy, type_name);
        }
    }

    let root = *mapping.get(&root)?;
    trace::trace!("cloned {} nodes under {} as {}", mapping.len(), originals[0], root);
    Some(ClonedSubtree { root, mapping })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{builder::ProgramBuilder, NodeKind};

    #[test]
    fn internal_edges_follow_copies() {
        let mut builder = ProgramBuilder::new();
        let label = builder.label("again");
        let goto = builder.goto_(label);
        let body = builder.block(vec![label, goto]);
        let mut program = builder.finish();

        let cloned = clone_subtree(&mut program, body, |_, target| *target).unwrap();
        let new_goto = cloned.mapping[&goto];
        let new_label = cloned.mapping[&label];

        assert_ne!(new_goto, goto);
        assert_eq!(
            program.control_flow.target(new_goto, &Label::Unlabeled),
            Some(Target::Node(new_label))
        );
        assert!(matches!(program.ast.kind(cloned.root), Some(NodeKind::Block(children)) if children == &vec![new_label, new_goto]));
    }

    #[test]
    fn outbound_edges_go_through_flow_out() {
        let mut builder = ProgramBuilder::new();
        let outside = builder.label("out");
        let goto = builder.goto_(outside);
        let body = builder.block(vec![goto]);
        let replacement = builder.empty();
        let mut program = builder.finish();

        let cloned = clone_subtree(&mut program, body, |label, _| {
            assert_eq!(label, &Label::Unlabeled);
            Target::Node(replacement)
        })
        .unwrap();

        assert_eq!(
            program
                .control_flow
                .target(cloned.mapping[&goto], &Label::Unlabeled),
            Some(Target::Node(replacement))
        );
        assert_eq!(
            program.control_flow.target(goto, &Label::Unlabeled),
            Some(Target::Node(outside))
        );
    }
}
