//! Reporting analysis errors together with what caused them.

use std::{collections::HashSet, fmt::Write};

use super::{Analysis, Error, Origin};

/// Returns `origin` followed by what caused it, transitively, as far as the analysis knows.
#[must_use]
pub fn provenance_chain(analysis: &Analysis, origin: &Origin) -> Vec<Origin> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(origin.clone());
    while let Some(origin) = current {
        if !visited.insert(origin.clone()) {
            break;
        }
        current = match &origin {
            Origin::Method(method) => analysis
                .method_info(method)
                .and_then(|it| it.called_from().first().cloned()),
            Origin::Class(class) => analysis
                .class_info(class)
                .and_then(|it| it.instantiated_from().first().cloned()),
            Origin::Core(_) | Origin::Exports => None,
        };
        chain.push(origin);
    }
    chain
}

/// Formats an error followed by one indented line per step of its provenance chain.
#[must_use]
pub fn format_error(analysis: &Analysis, error: &Error) -> String {
    let mut text = error.to_string();
    if let Some(origin) = error.origin() {
        for (depth, step) in provenance_chain(analysis, origin).iter().enumerate() {
            // Writing to a `String` cannot fail.
            let _ = write!(text, "\n{}from {step}", "  ".repeat(depth + 1));
        }
    }
    text
}

/// Logs the errors of an analysis, at most `max_reported` of them if given.
pub fn log_errors(analysis: &Analysis, max_reported: Option<usize>) {
    let errors = analysis.errors();
    let reported = max_reported.map_or(errors.len(), |max| max.min(errors.len()));
    for error in &errors[..reported] {
        tracing::error!("{}", format_error(analysis, error));
    }
    if reported < errors.len() {
        tracing::warn!(
            omitted = errors.len() - reported,
            "not all link errors are reported"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{AnalyzerConfig, MethodRef, analyze},
        ir::{ClassName, MethodName, Namespace, Tree},
        loader::{CachingInfoLoader, class_sources::MemoryClassSource},
        tests::{class_def, method_def, object_class_def, requirements},
    };

    #[tokio::test]
    async fn chains_follow_callers() {
        let main = method_def(
            Namespace::PublicStatic,
            MethodName::new("main__V"),
            Some(Tree::ApplyStatic {
                class: ClassName::new("B"),
                namespace: Namespace::PublicStatic,
                method: MethodName::new("foo__V"),
                args: Vec::new(),
            }),
        );
        let loader = CachingInfoLoader::new(MemoryClassSource::new([
            object_class_def(),
            class_def("A", Some("O"), vec![main]),
            class_def("B", Some("O"), Vec::new()),
        ]));
        let requirement =
            requirements().call_static_method(ClassName::new("A"), MethodName::new("main__V"));
        let analysis = analyze(AnalyzerConfig::default(), requirement, &loader)
            .await
            .unwrap();

        let [error] = analysis.errors() else {
            panic!("unexpected errors: {:?}", analysis.errors());
        };
        let main_ref = MethodRef::new(
            ClassName::new("A"),
            Namespace::PublicStatic,
            MethodName::new("main__V"),
        );
        assert_eq!(
            provenance_chain(&analysis, &Origin::Method(main_ref)),
            vec![
                Origin::Method(MethodRef::new(
                    ClassName::new("A"),
                    Namespace::PublicStatic,
                    MethodName::new("main__V"),
                )),
                Origin::Core("tests".to_owned()),
            ]
        );
        assert_eq!(
            format_error(&analysis, error),
            "Referring to non-existent method B.foo__V\n  from method A.main__V\n    from tests"
        );
    }
}
