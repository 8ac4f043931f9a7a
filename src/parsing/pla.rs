use {
    crate::{
        cube::Ternary,
        parsing::PestParser,
        protocol::{CubeRow, HeaderAtom, InputCubes},
    },
    pest::iterators::Pair,
};

mod internal {
    #[derive(pest_derive::Parser)]
    #[grammar = "parsing/pla.pest"]
    pub struct Parser;
}

pub struct HeaderAtomParser;

impl PestParser for HeaderAtomParser {
    type Node = HeaderAtom;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::atom;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node {
        match pair.as_rule() {
            internal::Rule::application => {
                let mut pairs = pair.into_inner();
                let name = pairs
                    .next()
                    .unwrap_or_else(|| Self::report_missing_pair())
                    .as_str()
                    .into();
                let arguments = pairs
                    .next()
                    .map(|arguments| {
                        arguments
                            .into_inner()
                            .map(|argument| argument.as_str().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                HeaderAtom { name, arguments }
            }

            // `(f(a,b) = v)` and `(c = v)` encode a function value; the value
            // becomes the final argument.
            internal::Rule::assignment => {
                let pairs: Vec<_> = pair.into_inner().collect();
                match pairs.as_slice() {
                    [name, value] => HeaderAtom {
                        name: name.as_str().into(),
                        arguments: vec![value.as_str().into()],
                    },
                    [name, arguments, value] => {
                        let mut arguments: Vec<String> = arguments
                            .clone()
                            .into_inner()
                            .map(|argument| argument.as_str().to_string())
                            .collect();
                        arguments.push(value.as_str().into());
                        HeaderAtom {
                            name: name.as_str().into(),
                            arguments,
                        }
                    }
                    _ => Self::report_missing_pair(),
                }
            }

            _ => Self::report_unexpected_pair(pair),
        }
    }
}

pub struct CubeRowParser;

impl PestParser for CubeRowParser {
    type Node = CubeRow;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::cube;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node {
        if pair.as_rule() != internal::Rule::cube {
            Self::report_unexpected_pair(pair)
        }

        let mut symbols: Vec<char> = pair
            .into_inner()
            .map(|value| {
                value
                    .as_str()
                    .chars()
                    .next()
                    .unwrap_or_else(|| Self::report_missing_pair())
            })
            .collect();

        // The final symbol of a row is the output value.
        let output = symbols.pop().unwrap_or_else(|| Self::report_missing_pair());
        let values = symbols
            .into_iter()
            .map(|symbol| {
                Ternary::try_from(symbol).expect("the grammar only admits ternary symbols")
            })
            .collect();
        CubeRow { values, output }
    }
}

pub struct TableParser;

impl PestParser for TableParser {
    type Node = InputCubes;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::table;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node {
        if pair.as_rule() != internal::Rule::table {
            Self::report_unexpected_pair(pair)
        }

        let mut input = InputCubes::default();

        for pair in pair.into_inner() {
            match pair.as_rule() {
                internal::Rule::input_count => {
                    let count = pair
                        .into_inner()
                        .next()
                        .unwrap_or_else(|| Self::report_missing_pair());
                    input.declared_inputs = Some(count.as_str().parse().unwrap());
                }

                internal::Rule::output_count => {
                    let count = pair
                        .into_inner()
                        .next()
                        .unwrap_or_else(|| Self::report_missing_pair());
                    input.declared_outputs = Some(count.as_str().parse().unwrap());
                }

                internal::Rule::input_names => {
                    input
                        .header
                        .extend(pair.into_inner().map(HeaderAtomParser::translate_pair));
                }

                internal::Rule::output_names => {
                    input
                        .output_names
                        .extend(pair.into_inner().map(|name| name.as_str().to_string()));
                }

                internal::Rule::cube => {
                    let row = CubeRowParser::translate_pair(pair);
                    if let Some(known) = input.rows.iter().find(|other| other.values == row.values)
                    {
                        tracing::warn!(
                            cube = %row.values.iter().map(Ternary::to_string).collect::<String>(),
                            output = %row.output,
                            known_output = %known.output,
                            "repeated occurrence of cube is ignored"
                        );
                        continue;
                    }
                    input.rows.push(row);
                }

                // Unrecognized content was already dropped by the grammar;
                // only the EOI marker remains.
                _ => (),
            }
        }

        input
    }
}
