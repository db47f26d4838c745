//! Binding of label references to label declarations.

use crate::ram::ast::{ArgumentValue, Scope};
use crate::ram::error::RamError;

/// Resolve every label reference in `scope` against its label table.
///
/// On success every `LabelReference` carries its [`crate::ram::Label`].
/// The first reference to an undeclared name aborts the pass.
pub fn resolve_labels(mut scope: Scope) -> Result<Scope, RamError> {
    let Scope {
        instructions,
        labels,
    } = &mut scope;

    for instruction in instructions.iter_mut() {
        let Some(argument) = instruction.argument.as_mut() else {
            continue;
        };
        let ArgumentValue::LabelReference { name, label } = &mut argument.value else {
            continue;
        };
        let target = labels
            .iter()
            .find(|candidate| candidate.name == *name)
            .ok_or_else(|| RamError::UnresolvedLabel {
                name: name.clone(),
                span: argument.span,
            })?;
        *label = Some(target.clone());
    }

    tracing::debug!(labels = labels.len(), "resolved RAM labels");
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::{parse, tokenize};
    use crate::span::Span;

    fn resolve_source(source: &str) -> Result<Scope, RamError> {
        resolve_labels(parse(&tokenize(source).expect("tokenize")).expect("parse"))
    }

    fn targets(scope: &Scope) -> Vec<u32> {
        scope
            .instructions
            .iter()
            .filter_map(|instruction| match &instruction.argument.as_ref()?.value {
                ArgumentValue::LabelReference { label, .. } => {
                    Some(label.as_ref().expect("resolved").instruction_address)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn binds_references_to_recorded_addresses() {
        let scope = resolve_source(
            "start: LOAD #3\nloop: SUB #1\nJNZERO loop\nJZERO done\nGOTO start\ndone: END",
        )
        .expect("resolve");
        assert_eq!(targets(&scope), vec![1, 5, 0]);
        for label in &scope.labels {
            assert!(label.instruction_address <= scope.instructions.len() as u32);
        }
    }

    #[test]
    fn allows_labels_past_the_last_instruction() {
        let scope = resolve_source("GOTO tail\ntail:").expect("resolve");
        assert_eq!(targets(&scope), vec![1]);
    }

    #[test]
    fn label_names_are_case_insensitive() {
        let scope = resolve_source("Loop: GOTO LOOP").expect("resolve");
        assert_eq!(targets(&scope), vec![0]);
    }

    #[test]
    fn leaves_other_arguments_untouched() {
        let source = "LOAD #1\nSTORE 2\nEND";
        let parsed = parse(&tokenize(source).expect("tokenize")).expect("parse");
        let resolved = resolve_labels(parsed.clone()).expect("resolve");
        assert_eq!(parsed, resolved);
    }

    #[test]
    fn reports_the_reference_token_of_an_undefined_label() {
        let err = resolve_source("LOAD #1\nGOTO UNDEFINED").unwrap_err();
        assert_eq!(
            err,
            RamError::UnresolvedLabel {
                name: "UNDEFINED".into(),
                span: Span::new(2, 6, 9),
            }
        );
    }
}
