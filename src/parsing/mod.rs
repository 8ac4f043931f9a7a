pub mod pla;
pub mod protocol;
pub mod weights;

use pest::{
    error::{Error, ErrorVariant},
    iterators::{Pair, Pairs},
    Parser, Position, RuleType,
};

pub trait CompleteParser<R: RuleType>: Parser<R> {
    fn parse_complete(rule: R, input: &str) -> Result<Pairs<'_, R>, Error<R>> {
        Self::parse(rule, input).and_then(|pairs| {
            if pairs.as_str() == input {
                Ok(pairs)
            } else {
                Err(Error::new_from_pos(
                    ErrorVariant::CustomError {
                        message: String::from("expected EOI"),
                    },
                    Position::new(input, pairs.as_str().len()).unwrap(),
                ))
            }
        })
    }
}

impl<P: Parser<R>, R: RuleType> CompleteParser<R> for P {}

/// A typed translation layer on top of a pest parser: parse a designated
/// rule completely, then fold the pair tree into a syntax node.
pub trait PestParser {
    type Node;

    type InternalParser: Parser<Self::Rule>;
    type Rule: RuleType;
    const RULE: Self::Rule;

    fn translate_pair(pair: Pair<'_, Self::Rule>) -> Self::Node;

    fn translate_pairs(mut pairs: Pairs<'_, Self::Rule>) -> Self::Node {
        let pair = pairs
            .next()
            .unwrap_or_else(|| Self::report_missing_pair());
        if let Some(pair) = pairs.next() {
            Self::report_unexpected_pair(pair)
        }
        Self::translate_pair(pair)
    }

    fn parse(input: &str) -> Result<Self::Node, Error<Self::Rule>> {
        <Self::InternalParser as CompleteParser<Self::Rule>>::parse_complete(Self::RULE, input)
            .map(Self::translate_pairs)
    }

    fn report_missing_pair() -> ! {
        panic!("in {}: no pair found", std::any::type_name::<Self>())
    }

    fn report_unexpected_pair(pair: Pair<'_, Self::Rule>) -> ! {
        panic!(
            "in {}: unexpected pair found: {pair}",
            std::any::type_name::<Self>()
        )
    }
}
