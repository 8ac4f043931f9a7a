use {
    crate::{
        parsing::PestParser,
        protocol::{Declaration, Parameter},
    },
    pest::iterators::Pair,
};

mod internal {
    #[derive(pest_derive::Parser)]
    #[grammar = "parsing/protocol.pest"]
    pub struct Parser;
}

pub struct ParameterParser;

impl PestParser for ParameterParser {
    type Node = Parameter;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::parameter;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node {
        if pair.as_rule() != internal::Rule::parameter {
            Self::report_unexpected_pair(pair)
        }

        let mut pairs = pair.into_inner();
        let name = pairs
            .next()
            .unwrap_or_else(|| Self::report_missing_pair())
            .as_str()
            .into();
        let sort = pairs
            .next()
            .unwrap_or_else(|| Self::report_missing_pair())
            .as_str()
            .into();
        Parameter { name, sort }
    }
}

fn translate_parameters(pair: Pair<'_, internal::Rule>) -> Vec<Parameter> {
    pair.into_inner()
        .map(ParameterParser::translate_pair)
        .collect()
}

pub struct DeclarationParser;

impl PestParser for DeclarationParser {
    type Node = Declaration;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::declaration;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node {
        match pair.as_rule() {
            internal::Rule::sort_declaration => {
                let mut pairs = pair.into_inner();
                let name = pairs
                    .next()
                    .unwrap_or_else(|| Self::report_missing_pair())
                    .as_str()
                    .into();
                Declaration::Sort { name }
            }

            internal::Rule::relation_declaration => {
                let mut pairs = pair.into_inner();
                let name = pairs
                    .next()
                    .unwrap_or_else(|| Self::report_missing_pair())
                    .as_str()
                    .into();
                let parameters = pairs.next().map(translate_parameters).unwrap_or_default();
                Declaration::Relation { name, parameters }
            }

            internal::Rule::function_declaration => {
                let pairs: Vec<_> = pair.into_inner().collect();
                match pairs.as_slice() {
                    [name, returns] => Declaration::Function {
                        name: name.as_str().into(),
                        parameters: vec![],
                        returns: returns.as_str().into(),
                    },
                    [name, parameters, returns] => Declaration::Function {
                        name: name.as_str().into(),
                        parameters: translate_parameters(parameters.clone()),
                        returns: returns.as_str().into(),
                    },
                    _ => Self::report_missing_pair(),
                }
            }

            internal::Rule::individual_declaration => {
                let mut pairs = pair.into_inner();
                let name = pairs
                    .next()
                    .unwrap_or_else(|| Self::report_missing_pair())
                    .as_str()
                    .into();
                let sort = pairs
                    .next()
                    .unwrap_or_else(|| Self::report_missing_pair())
                    .as_str()
                    .into();
                Declaration::Individual { name, sort }
            }

            _ => Self::report_unexpected_pair(pair),
        }
    }
}

pub struct SpecificationParser;

impl PestParser for SpecificationParser {
    type Node = Vec<Declaration>;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::specification;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node {
        if pair.as_rule() != internal::Rule::specification {
            Self::report_unexpected_pair(pair)
        }

        pair.into_inner()
            .filter(|pair| {
                matches!(
                    pair.as_rule(),
                    internal::Rule::sort_declaration
                        | internal::Rule::relation_declaration
                        | internal::Rule::function_declaration
                        | internal::Rule::individual_declaration
                )
            })
            .map(DeclarationParser::translate_pair)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{internal, SpecificationParser},
        crate::{
            parsing::{CompleteParser as _, PestParser as _},
            protocol::Declaration,
        },
    };

    fn recognize(rule: internal::Rule, accept: Vec<&str>, reject: Vec<&str>) {
        for example in accept {
            assert!(
                internal::Parser::parse_complete(rule, example).is_ok(),
                "assertion failed: rule {rule:?} rejects '{example}'"
            );
        }

        for example in reject {
            assert!(
                internal::Parser::parse_complete(rule, example).is_err(),
                "assertion failed: rule {rule:?} accepts '{example}'"
            );
        }
    }

    #[test]
    fn recognize_name() {
        recognize(
            internal::Rule::name,
            vec!["node", "_n", "leq2", "Quorum"],
            vec!["2node", "", "a-b"],
        )
    }

    #[test]
    fn recognize_declarations() {
        recognize(
            internal::Rule::sort_declaration,
            vec!["type node", "type  quorum"],
            vec!["type", "type 2n"],
        );
        recognize(
            internal::Rule::relation_declaration,
            vec![
                "relation leq(X: node, Y: node)",
                "relation leq(X:node,Y:node)",
                "relation started",
                "relation started()",
            ],
            vec!["relation", "relation leq(X node)"],
        );
        recognize(
            internal::Rule::function_declaration,
            vec![
                "function owner(K: key): node",
                "function count: num",
            ],
            vec!["function owner(K: key)"],
        );
        recognize(
            internal::Rule::individual_declaration,
            vec!["individual leader: node"],
            vec!["individual leader"],
        );
    }

    #[test]
    fn specifications_keep_declarations_and_drop_the_rest() {
        let declarations = SpecificationParser::parse(
            "#lang ivy1.7\n\
             \n\
             type node\n\
             type quorum # majorities\n\
             relation leq(X: node, Y: node)\n\
             axiom forall X . leq(X, X)\n\
             function owner(K: key): node\n\
             individual leader: node\n\
             init leq(n1, n1)\n",
        )
        .unwrap();

        assert_eq!(declarations.len(), 5);
        assert!(matches!(&declarations[0], Declaration::Sort { name } if name == "node"));
        assert!(matches!(
            &declarations[2],
            Declaration::Relation { name, parameters } if name == "leq" && parameters.len() == 2
        ));
        assert!(matches!(
            &declarations[3],
            Declaration::Function { returns, .. } if returns == "node"
        ));
        assert!(matches!(
            &declarations[4],
            Declaration::Individual { sort, .. } if sort == "node"
        ));
    }

    #[test]
    fn malformed_declarations_fall_through_silently() {
        let declarations =
            SpecificationParser::parse("relation leq(X: node extra\ntype node\n").unwrap();
        assert_eq!(declarations.len(), 1);
        assert!(matches!(&declarations[0], Declaration::Sort { .. }));
    }
}
