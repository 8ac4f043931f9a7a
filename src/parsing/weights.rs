use {indexmap::IndexMap, thiserror::Error};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unexpected end of file inside a quantified-cost record")]
    UnexpectedEnd,
    #[error("malformed quantified-cost line: `{0}`")]
    MalformedLine(String),
}

/// The quantified form of a prime implicant together with its quantified
/// cost (the sum of the universal, existential, and literal counts).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub quantified_form: String,
    pub cost: usize,
}

/// Parse the quantified-cost records produced by the external quantifier
/// inference. A record starts at a `->` marker; the cube may follow the
/// marker on the same line or stand on the `pla:` line below it:
///
/// ```text
/// -> pla: ----1--0
/// quantifier-free: (~committed(r1) | ~aborted(r0))
/// quantified: (forall R1, R2 . ...)
/// num-forall: 2
/// num-exists: 0
/// num-lits: 3
/// ```
///
/// Records are keyed by the ternary cube string.
pub fn parse(input: &str) -> Result<IndexMap<String, Record>, ParseError> {
    let mut records = IndexMap::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();
        if !line.starts_with("->") {
            continue;
        }

        let marker_rest = line["->".len()..].trim();
        let cube = if marker_rest.is_empty() {
            field(lines.next().ok_or(ParseError::UnexpectedEnd)?)?
        } else {
            field(marker_rest)?
        };
        let _quantifier_free = field(next_line(&mut lines)?)?;
        let quantified_form = field(next_line(&mut lines)?)?;
        let foralls = number(next_line(&mut lines)?)?;
        let exists = number(next_line(&mut lines)?)?;
        let literals = number(next_line(&mut lines)?)?;

        records.insert(
            cube,
            Record {
                quantified_form,
                cost: foralls + exists + literals,
            },
        );
    }

    Ok(records)
}

fn next_line<'a>(lines: &mut std::str::Lines<'a>) -> Result<&'a str, ParseError> {
    lines.next().ok_or(ParseError::UnexpectedEnd)
}

/// The value part of a `label: value` line.
fn field(line: &str) -> Result<String, ParseError> {
    line.splitn(2, ':')
        .nth(1)
        .map(|value| value.trim().to_string())
        .ok_or_else(|| ParseError::MalformedLine(line.trim().to_string()))
}

fn number(line: &str) -> Result<usize, ParseError> {
    let value = field(line)?;
    value
        .parse()
        .map_err(|_| ParseError::MalformedLine(line.trim().to_string()))
}
