use {
    crate::protocol::Atom,
    std::fmt::{self, Display, Formatter},
    thiserror::Error,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("`{0}` is not a ternary value (expected one of `0`, `1`, `-`)")]
    InvalidValue(char),
}

/// A single position of a cube: false, true, or don't-care.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Ternary {
    False,
    True,
    DontCare,
}

impl Ternary {
    pub fn is_care(self) -> bool {
        !matches!(self, Ternary::DontCare)
    }
}

impl TryFrom<char> for Ternary {
    type Error = Error;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            '0' => Ok(Ternary::False),
            '1' => Ok(Ternary::True),
            '-' => Ok(Ternary::DontCare),
            other => Err(Error::InvalidValue(other)),
        }
    }
}

impl Display for Ternary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ternary::False => write!(f, "0"),
            Ternary::True => write!(f, "1"),
            Ternary::DontCare => write!(f, "-"),
        }
    }
}

pub fn values_from_str(input: &str) -> Result<Vec<Ternary>, Error> {
    input.chars().map(Ternary::try_from).collect()
}

/// A conjunction of literals over the atom positions, stored as a ternary
/// vector. Care positions are mirrored into signed literals: position `i`
/// contributes `i + 1` when true and `-(i + 1)` when false, so that a cube
/// can be handed to a SAT solver without further translation. `care_neg`
/// holds the clause that rules the cube out.
///
/// Ids are handed out by a [`CubeFactory`]; id 0 is reserved for transient
/// cubes that never reach a solver.
#[derive(Clone, Debug, Eq)]
pub struct Cube {
    pub id: i32,
    pub values: Vec<Ternary>,
    pub care: Vec<i32>,
    pub care_neg: Vec<i32>,
}

impl Cube {
    fn new(id: i32, values: Vec<Ternary>) -> Self {
        let mut care = Vec::new();
        let mut care_neg = Vec::new();

        for (index, value) in values.iter().enumerate() {
            let variable = index as i32 + 1;
            match value {
                Ternary::True => {
                    care.push(variable);
                    care_neg.push(-variable);
                }
                Ternary::False => {
                    care.push(-variable);
                    care_neg.push(variable);
                }
                Ternary::DontCare => (),
            }
        }

        Cube {
            id,
            values,
            care,
            care_neg,
        }
    }

    /// A cube with the reserved id 0, for comparisons only.
    pub fn anonymous(values: Vec<Ternary>) -> Self {
        Cube::new(0, values)
    }

    /// The number of care positions; doubles as the default cost of a prime
    /// implicant.
    pub fn len(&self) -> usize {
        self.care.len()
    }

    pub fn is_empty(&self) -> bool {
        self.care.is_empty()
    }
}

// Cube identity is the ternary vector; ids are bookkeeping.
impl PartialEq for Cube {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl std::hash::Hash for Cube {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl Display for Cube {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for value in &self.values {
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Hands out cube ids in strict monotone order. The counter is seeded with
/// N + 1 (N = atom count) so that cube ids never collide with the atom
/// variables 1..=N of the cover-table CNF.
#[derive(Debug)]
pub struct CubeFactory {
    next_id: i32,
}

impl CubeFactory {
    pub fn new(first_id: i32) -> Self {
        CubeFactory { next_id: first_id }
    }

    pub fn cube(&mut self, values: Vec<Ternary>) -> Cube {
        let id = self.next_id;
        self.next_id += 1;
        Cube::new(id, values)
    }
}

/// An equivalence class of prime implicants under the domain symmetries.
///
/// Without symmetries the class is a singleton. Otherwise `eq_class` holds
/// every orbit member, the first of which is the dedicated representative;
/// the representative's cube id doubles as the activation variable of the
/// class in the cover-table CNF.
#[derive(Clone, Debug)]
pub struct PiClass {
    pub id: i32,
    pub eq_class: Vec<Cube>,
    pub cost: usize,
    pub qcost: usize,
    pub has_const: usize,
    pub has_all_const: bool,
    pub coverage: usize,
    pub decided: bool,
    pub quantified_form: String,
}

impl PiClass {
    pub fn new(representative: Cube, atoms: &[Atom]) -> Self {
        let cost = representative.len();

        let mut has_const = 0;
        let mut has_all_const = true;
        for (value, atom) in representative.values.iter().zip(atoms) {
            if value.is_care() && atom.arguments.is_empty() {
                has_const += 1;
            } else if value.is_care() {
                has_all_const = false;
            }
        }

        PiClass {
            id: representative.id,
            eq_class: vec![representative],
            cost,
            qcost: 0,
            has_const,
            has_all_const,
            coverage: 0,
            decided: false,
            quantified_form: String::new(),
        }
    }

    pub fn representative(&self) -> &Cube {
        &self.eq_class[0]
    }

    pub fn add_equivalent(&mut self, cube: Cube) {
        self.eq_class.push(cube);
    }

    pub fn size(&self) -> usize {
        self.eq_class.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.eq_class.len() == 1
    }

    pub fn contains(&self, values: &[Ternary]) -> bool {
        self.eq_class.iter().any(|cube| cube.values == values)
    }
}
