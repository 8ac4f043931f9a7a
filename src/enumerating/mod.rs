use {
    crate::{
        cube::{CubeFactory, PiClass, Ternary},
        protocol::Atom,
        solving::{self, Solver},
        symmetry::SymmetryTable,
    },
    anyhow::Result,
    rustsat::{
        encodings::card::{BoundUpper, Totalizer},
        instances::{BasicVarManager, Cnf},
        types::{Lit, Var},
    },
};

/// The dual-rail variable layout: atom `i` owns the variable pair
/// `p = 2i + 1` (the atom occurs positively in a cube) and `n = 2i + 2`
/// (it occurs negatively). Both false means the position is a don't-care;
/// both true is excluded by construction.
#[derive(Debug)]
pub struct DualRailEncoder {
    nof_atoms: usize,
}

impl DualRailEncoder {
    pub fn new(nof_atoms: usize) -> Self {
        DualRailEncoder { nof_atoms }
    }

    pub fn positive(&self, atom: usize) -> i32 {
        (atom * 2 + 1) as i32
    }

    pub fn negative(&self, atom: usize) -> i32 {
        (atom * 2 + 2) as i32
    }

    pub fn top(&self) -> i32 {
        (self.nof_atoms * 2) as i32
    }

    /// The CNF whose models are exactly the cubes that conflict with every
    /// input cube: per-atom exclusion clauses plus one clause per input cube
    /// (a `0` position is contradicted by the positive rail, a `1` position
    /// by the negative rail).
    pub fn clauses(&self, cubes: &[Vec<Ternary>]) -> Vec<Vec<i32>> {
        let mut clauses = Vec::with_capacity(self.nof_atoms + cubes.len());

        for atom in 0..self.nof_atoms {
            clauses.push(vec![-self.positive(atom), -self.negative(atom)]);
        }

        for cube in cubes {
            let mut clause = Vec::new();
            for (atom, value) in cube.iter().enumerate() {
                match value {
                    Ternary::False => clause.push(self.positive(atom)),
                    Ternary::True => clause.push(self.negative(atom)),
                    Ternary::DontCare => (),
                }
            }
            clauses.push(clause);
        }

        clauses
    }

    /// Read the cube off the solver's current model.
    fn decode(&self, solver: &Solver) -> Result<Vec<Ternary>> {
        let mut values = Vec::with_capacity(self.nof_atoms);
        for atom in 0..self.nof_atoms {
            let value = if solver.is_true(self.positive(atom))? {
                Ternary::True
            } else if solver.is_true(self.negative(atom))? {
                Ternary::False
            } else {
                Ternary::DontCare
            };
            values.push(value);
        }
        Ok(values)
    }

    /// The clause forbidding this exact cube in the dual-rail encoding.
    fn blocking_clause(&self, values: &[Ternary]) -> Vec<i32> {
        let mut clause = Vec::new();
        for (atom, value) in values.iter().enumerate() {
            match value {
                Ternary::True => clause.push(-self.positive(atom)),
                Ternary::False => clause.push(-self.negative(atom)),
                Ternary::DontCare => (),
            }
        }
        clause
    }
}

/// Enumerate every prime implicant of the negated cube set, collapsed into
/// its symmetry orbit.
///
/// The cardinality of the dual-rail assignment is bounded by a totalizer;
/// enumerating all models for bound 0, 1, …, N in turn yields cubes in
/// ascending literal count. Blocking a found cube removes all of its
/// extensions from the search space, so everything reported later is prime,
/// and blocking every orbit member reports each orbit exactly once (with the
/// first solver model as its representative).
pub fn enumerate_classes(
    table: &SymmetryTable,
    atoms: &[Atom],
    cubes: &[Vec<Ternary>],
    factory: &mut CubeFactory,
) -> Result<Vec<PiClass>> {
    let encoder = DualRailEncoder::new(atoms.len());
    let clauses = encoder.clauses(cubes);

    let mut solver = Solver::new();
    solver.reserve(encoder.top())?;
    for clause in &clauses {
        solver.add_clause(clause)?;
    }
    tracing::info!(
        variables = encoder.top(),
        clauses = clauses.len(),
        "built dual-rail encoding"
    );

    let rail_literals: Vec<Lit> = (1..=encoder.top()).map(solving::lit).collect();
    let mut totalizer: Totalizer = rail_literals.into_iter().collect();
    let mut totalizer_clauses = Cnf::new();
    let mut variables = BasicVarManager::from_next_free(Var::new(encoder.top() as u32));
    totalizer.encode_ub(0..=atoms.len(), &mut totalizer_clauses, &mut variables)?;
    solver.add_cnf(totalizer_clauses)?;

    let mut classes = Vec::new();
    let mut pi_count = 0usize;

    for bound in 0..=atoms.len() {
        let assumptions: Vec<i32> = totalizer
            .enforce_ub(bound)?
            .into_iter()
            .map(solving::external)
            .collect();

        while solver.solve(&assumptions)? {
            let values = encoder.decode(&solver)?;

            let mut class: Option<PiClass> = None;
            for variant in table.orbit(&values) {
                pi_count += 1;
                let blocking = encoder.blocking_clause(&variant);
                let cube = factory.cube(variant);
                match class {
                    None => class = Some(PiClass::new(cube, atoms)),
                    Some(ref mut class) => class.add_equivalent(cube),
                }
                solver.add_clause(&blocking)?;
            }
            classes.push(class.expect("an orbit always contains its seed"));
        }
    }

    tracing::info!(
        classes = classes.len(),
        implicants = pi_count,
        sat_calls = solver.calls(),
        "enumerated prime implicants"
    );
    Ok(classes)
}
