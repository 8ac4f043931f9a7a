use {
    crate::{covering::CoverTable, cube::PiClass},
    anyhow::{ensure, Result},
    indexmap::IndexMap,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct SearchOptions {
    pub all_solutions: bool,
    pub check_solution: bool,
    pub prefer_consts: bool,
}

/// The outcome of a minimization run: one or all minimum-cost covers, each
/// as the list of selected class ids in selection order.
#[derive(Debug)]
pub struct Minimization {
    pub solutions: Vec<Vec<i32>>,
    pub cost: usize,
    pub all_root_essential: bool,
    pub sat_calls: usize,
    pub classes: IndexMap<i32, PiClass>,
}

/// Branch-and-bound search for a minimum-cost set of prime-implicant
/// classes that rules out the same states as the full class set.
///
/// Three disjoint id lists are maintained: `ptrail` (active classes, in
/// selection order), `unk` (undecided classes), and the signed `trail`
/// recording activations and exclusions in assignment order. Propagation
/// (covered-class removal and conditional-essential promotion) runs to
/// fixpoint between decisions, as in a DPLL solver.
pub struct Minimizer {
    classes: IndexMap<i32, PiClass>,
    table: CoverTable,
    options: SearchOptions,
    ptrail: Vec<i32>,
    trail: Vec<i32>,
    unk: Vec<i32>,
    current_cost: usize,
    max_cost: usize,
    upper_bound: usize,
    best_solutions: Vec<Vec<i32>>,
}

impl Minimizer {
    pub fn new(
        classes: Vec<PiClass>,
        max_input_var: i32,
        options: SearchOptions,
    ) -> Result<Self> {
        let mut map = IndexMap::with_capacity(classes.len());
        for mut class in classes {
            // An externally supplied quantified cost overrides the literal
            // count.
            if class.qcost > 0 {
                class.cost = class.qcost;
            }
            map.insert(class.id, class);
        }

        let table = CoverTable::new(&map, max_input_var)?;

        Ok(Minimizer {
            classes: map,
            table,
            options,
            ptrail: Vec::new(),
            trail: Vec::new(),
            unk: Vec::new(),
            current_cost: 0,
            max_cost: 0,
            upper_bound: 0,
            best_solutions: Vec::new(),
        })
    }

    pub fn solve(mut self) -> Result<Minimization> {
        self.initialize()?;

        if self.unk.is_empty() {
            tracing::info!("all classes are root-essential, no search performed");
            let solution = self.ptrail.clone();
            if self.options.check_solution {
                ensure!(
                    self.table.compare_solutions(&self.classes, &solution)?,
                    "the root-essential classes do not reproduce the input model set"
                );
            }
            return Ok(Minimization {
                solutions: vec![solution],
                cost: self.current_cost,
                all_root_essential: true,
                sat_calls: self.table.sat_calls(),
                classes: self.classes,
            });
        }

        self.search()?;

        if self.options.check_solution {
            for solution in &self.best_solutions {
                ensure!(
                    self.table.compare_solutions(&self.classes, solution)?,
                    "a minimized cover does not reproduce the input model set"
                );
            }
        }

        Ok(Minimization {
            solutions: self.best_solutions,
            cost: self.upper_bound,
            all_root_essential: false,
            sat_calls: self.table.sat_calls(),
            classes: self.classes,
        })
    }

    fn initialize(&mut self) -> Result<()> {
        self.ptrail = self.table.root_essentials(&self.classes)?;
        self.trail = self.ptrail.clone();

        for (&id, class) in &self.classes {
            self.max_cost += class.cost;
            if self.ptrail.contains(&id) {
                self.current_cost += class.cost;
            } else {
                self.unk.push(id);
            }
        }
        self.upper_bound = self.max_cost + 1;
        tracing::info!(essentials = ?self.ptrail, "root-essential classes");

        if self.unk.is_empty() {
            return Ok(());
        }

        self.propagate_fixpoint()?;
        self.unk.sort_by_key(|id| self.classes[id].coverage);
        tracing::info!(
            undecided = self.unk.len(),
            cost = self.current_cost,
            upper_bound = self.upper_bound,
            "initialized cover search"
        );
        Ok(())
    }

    /// Covered-class removal and conditional-essential promotion, repeated
    /// until neither applies.
    fn propagate_fixpoint(&mut self) -> Result<()> {
        loop {
            let covered = self.table.remove_covered(
                &mut self.classes,
                &self.ptrail,
                &mut self.unk,
                &mut self.trail,
            )?;
            let essentials = self.table.conditional_essentials(
                &self.classes,
                &mut self.ptrail,
                &mut self.unk,
                &mut self.trail,
            )?;
            for id in &essentials {
                self.current_cost += self.classes[id].cost;
            }
            if covered.is_empty() && essentials.is_empty() {
                return Ok(());
            }
            tracing::trace!(covered = ?covered, essentials = ?essentials, "propagated");
        }
    }

    fn search(&mut self) -> Result<()> {
        'search: loop {
            self.propagate_fixpoint()?;

            if self.unk.is_empty() {
                self.evaluate_solution();
                if self.backtrack().is_none() {
                    break 'search;
                }
            } else if self.cost_is_over_bound() {
                while self.cost_is_over_bound() {
                    if self.backtrack().is_none() {
                        break 'search;
                    }
                }
            } else {
                let decision = self.decide();
                tracing::trace!(decision, "decided");
                if self.cost_is_over_bound() && self.backtrack().is_none() {
                    break 'search;
                }
            }
        }
        Ok(())
    }

    /// Pick the undecided class with the smallest coverage (ties broken by
    /// position, all-constant classes first when preferred) and activate it.
    fn decide(&mut self) -> i32 {
        self.unk.sort_by_key(|id| self.classes[id].coverage);

        let mut index = 0;
        if self.options.prefer_consts {
            if let Some(found) = self
                .unk
                .iter()
                .position(|id| self.classes[id].has_all_const)
            {
                index = found;
            }
        }

        let id = self.unk.remove(index);
        self.classes[&id].decided = true;
        self.assign(id);
        id
    }

    fn assign(&mut self, literal: i32) {
        self.trail.push(literal);
        if literal > 0 {
            self.ptrail.push(literal);
            self.current_cost += self.classes[&literal].cost;
        }
    }

    /// Undo the trail up to the most recent decision, flip that decision to
    /// an exclusion, and return its id; `None` once the trail is exhausted.
    /// Propagated entries go back to the undecided list.
    fn backtrack(&mut self) -> Option<i32> {
        while let Some(literal) = self.trail.pop() {
            let id = literal.abs();
            if literal > 0 {
                self.ptrail.pop();
                self.current_cost -= self.classes[&id].cost;
            }
            if self.classes[&id].decided {
                self.classes[&id].decided = false;
                self.assign(-id);
                return Some(id);
            }
            self.unk.push(id);
        }
        None
    }

    fn evaluate_solution(&mut self) {
        if self.current_cost < self.upper_bound {
            self.best_solutions = vec![self.ptrail.clone()];
            self.upper_bound = self.current_cost;
            tracing::info!(
                cost = self.current_cost,
                size = self.ptrail.len(),
                "improved solution"
            );
        } else if self.current_cost == self.upper_bound && self.options.all_solutions {
            self.best_solutions.push(self.ptrail.clone());
            tracing::info!(
                cost = self.current_cost,
                size = self.ptrail.len(),
                "another optimal solution"
            );
        }
    }

    fn cost_is_over_bound(&self) -> bool {
        if self.options.all_solutions {
            self.current_cost > self.upper_bound
        } else {
            self.current_cost >= self.upper_bound
        }
    }
}
