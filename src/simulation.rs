//! The simulator engine.
//!
//! A simulation owns the population store, one schedule queue per node,
//! the stockpile network, and the single random stream. Each call to
//! [`Simulation::simulate`] advances one day: copy the variables forward,
//! apply antivirals and vaccines, rebuild the population caches, drain
//! every event scheduled before the end of the day in time order, run the
//! travel step, record surveillance, and advance the clock.
//!
//! All mutation is driven by the engine consuming events, applying
//! interventions, and calling [`Simulation::expose`], which samples fresh
//! schedules for the newly exposed.

use crate::error::PansimError;
use crate::ili::IliSurveillance;
use crate::log::{debug, error, warn};
use crate::npi::combined_effectiveness;
use crate::parameters::Parameters;
use crate::priority::PriorityGroupSelections;
use crate::queue::ScheduleQueue;
use crate::rng::SimRng;
use crate::scenario::{NodeId, Scenario};
use crate::schedule::{ContactTarget, DiseaseState, Event, Schedule};
use crate::stockpile::{Resource, StockpileNetwork};
use crate::stratum::{
    Stratum, StratumSelector, AGE_FLOW_REDUCTION, CONTACT_RATES, NUM_AGE_GROUPS, NUM_RISK_GROUPS,
    NUM_VACCINATED_GROUPS, SIGMA, TRAVEL_RHO,
};
use crate::variables::{Variable, VariableStore};
use std::str::FromStr;

/// Per-node population cache, `[age][risk][vax]`.
type NodeStrata = [[[f64; NUM_VACCINATED_GROUPS]; NUM_RISK_GROUPS]; NUM_AGE_GROUPS];

/// Compartments the vaccine pass applies to; the deceased stay put. Order
/// matters: the schedule walk maps disease states to indices in this list.
const VACCINATED_COMPARTMENTS: [Variable; 6] = [
    Variable::Susceptible,
    Variable::Exposed,
    Variable::Asymptomatic,
    Variable::Treatable,
    Variable::Infectious,
    Variable::Recovered,
];

fn vaccinated_compartment_index(state: DiseaseState) -> Option<usize> {
    match state {
        DiseaseState::Exposed => Some(1),
        DiseaseState::Asymptomatic => Some(2),
        DiseaseState::Treatable => Some(3),
        DiseaseState::Infectious => Some(4),
        DiseaseState::Recovered => Some(5),
        DiseaseState::Deceased => None,
    }
}

/// Quantities computed on demand from the stored variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerivedVariable {
    AllInfected,
    VaccinatedInLatencyPeriod,
    VaccinatedEffective,
    IliReports,
}

impl DerivedVariable {
    pub fn name(self) -> &'static str {
        match self {
            DerivedVariable::AllInfected => "All infected",
            DerivedVariable::VaccinatedInLatencyPeriod => "vaccinated in lag period",
            DerivedVariable::VaccinatedEffective => "vaccinated effective",
            DerivedVariable::IliReports => "ILI reports",
        }
    }

    pub const ALL: [DerivedVariable; 4] = [
        DerivedVariable::AllInfected,
        DerivedVariable::VaccinatedInLatencyPeriod,
        DerivedVariable::VaccinatedEffective,
        DerivedVariable::IliReports,
    ];
}

impl FromStr for DerivedVariable {
    type Err = PansimError;

    fn from_str(name: &str) -> Result<DerivedVariable, PansimError> {
        DerivedVariable::ALL
            .into_iter()
            .find(|v| v.name() == name)
            .ok_or_else(|| PansimError::from(format!("unknown derived variable: {name}")))
    }
}

pub struct Simulation {
    params: Parameters,
    scenario: Scenario,
    rng: SimRng,
    store: VariableStore,
    queues: Vec<ScheduleQueue>,
    stockpiles: StockpileNetwork,
    ili: Option<IliSurveillance>,
    /// Completed days; variables are filled through this index.
    time: usize,
    /// Continuous event clock within the current day.
    now: f64,
    cached_time: Option<usize>,
    populations: Vec<NodeStrata>,
    population_nodes: Vec<f64>,
}

impl Simulation {
    /// Builds a simulation from a validated scenario and parameters. The
    /// scenario's initial cases are exposed immediately at `t = 0`.
    pub fn new(
        scenario: Scenario,
        params: Parameters,
        seed: u64,
    ) -> Result<Simulation, PansimError> {
        params.validate()?;
        scenario.validate()?;

        let num_nodes = scenario.num_nodes();
        let mut store = VariableStore::new(num_nodes);
        for (node, spec) in scenario.nodes.iter().enumerate() {
            for age in 0..NUM_AGE_GROUPS {
                for risk in 0..NUM_RISK_GROUPS {
                    let count = spec.population[age][risk];
                    let stratum = Stratum::new(age, risk, 0);
                    store.set_value(Variable::Susceptible, 0, node, stratum, count);
                    store.set_value(Variable::Population, 0, node, stratum, count);
                }
            }
        }

        let initial: Vec<(u64, u64)> = scenario
            .nodes
            .iter()
            .map(|node| (node.antiviral_stockpile, node.vaccine_stockpile))
            .collect();
        let deliveries = scenario
            .deliveries
            .iter()
            .map(|d| {
                // Validation guarantees the node exists.
                (d.day, scenario.node_index(d.node).unwrap(), d.resource, d.amount)
            })
            .collect();
        let stockpiles = StockpileNetwork::new(&initial, deliveries);

        let ili = params
            .ili
            .clone()
            .map(|config| IliSurveillance::new(num_nodes, config));

        let mut simulation = Simulation {
            params,
            rng: SimRng::seed_from_u64(seed),
            store,
            queues: (0..num_nodes).map(|_| ScheduleQueue::new()).collect(),
            stockpiles,
            ili,
            time: 0,
            now: 0.0,
            cached_time: None,
            populations: vec![[[[0.0; NUM_VACCINATED_GROUPS]; NUM_RISK_GROUPS]; NUM_AGE_GROUPS]; num_nodes],
            population_nodes: vec![0.0; num_nodes],
            scenario,
        };

        for cases in simulation.scenario.initial_cases.clone() {
            let node = simulation.scenario.node_index(cases.node).unwrap();
            simulation.expose(cases.count, node, Stratum::new(cases.age, cases.risk, 0));
        }

        Ok(simulation)
    }

    pub fn num_nodes(&self) -> usize {
        self.scenario.num_nodes()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.scenario.nodes.iter().map(|node| node.id).collect()
    }

    pub fn node_name(&self, node: NodeId) -> Result<&str, PansimError> {
        let index = self.node_index(node)?;
        Ok(&self.scenario.nodes[index].name)
    }

    /// Completed days.
    pub fn time(&self) -> usize {
        self.time
    }

    /// Number of stored time frames, `time + 1` between steps.
    pub fn num_times(&self) -> usize {
        self.store.num_times()
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn stockpiles(&self) -> &StockpileNetwork {
        &self.stockpiles
    }

    fn node_index(&self, node: NodeId) -> Result<usize, PansimError> {
        self.scenario
            .node_index(node)
            .ok_or_else(|| PansimError::from(format!("unknown node {node}")))
    }

    /// A stored variable value; wildcard selector dimensions are summed.
    pub fn value(
        &self,
        var: Variable,
        t: usize,
        node: NodeId,
        selector: StratumSelector,
    ) -> Result<f64, PansimError> {
        let index = self.node_index(node)?;
        self.store.get(var, t, index, selector)
    }

    /// A derived variable value; see [`DerivedVariable`].
    pub fn derived(
        &self,
        var: DerivedVariable,
        t: usize,
        node: NodeId,
        selector: StratumSelector,
    ) -> Result<f64, PansimError> {
        let index = self.node_index(node)?;
        match var {
            DerivedVariable::AllInfected => {
                Ok(self.store.get(Variable::Asymptomatic, t, index, selector)?
                    + self.store.get(Variable::Treatable, t, index, selector)?
                    + self.store.get(Variable::Infectious, t, index, selector)?)
            }
            DerivedVariable::VaccinatedInLatencyPeriod => {
                // The unvaccinated stratum of the daily counter is always
                // zero, so the selector can stay as given.
                let latency = self.params.vaccine_latency_period as usize;
                let mut total = 0.0;
                for back in 0..latency {
                    if back > t {
                        break;
                    }
                    total += self
                        .store
                        .get(Variable::VaccinatedDaily, t - back, index, selector)?;
                }
                Ok(total)
            }
            DerivedVariable::VaccinatedEffective => {
                if selector.vax == Some(0) {
                    return Ok(0.0);
                }
                let vaccinated = selector.with_vax(1);
                let population = self.store.get(Variable::Population, t, index, vaccinated)?;
                let in_latency = self.derived(
                    DerivedVariable::VaccinatedInLatencyPeriod,
                    t,
                    node,
                    vaccinated,
                )?;
                Ok(population - in_latency)
            }
            DerivedVariable::IliReports => {
                let Some(ili) = &self.ili else {
                    return Err("ILI surveillance is disabled".into());
                };
                let population =
                    self.store
                        .get(Variable::Population, t, index, StratumSelector::ALL)?;
                Ok(ili.fraction(t, index) * population)
            }
        }
    }

    /// Seeds `count` exposures into a node; the entry point UIs use before
    /// the first day is simulated. Returns the number actually exposed.
    pub fn initial_cases(
        &mut self,
        node: NodeId,
        stratum: Stratum,
        count: u64,
    ) -> Result<u64, PansimError> {
        let index = self.node_index(node)?;
        if !stratum.is_valid() {
            return Err(format!("invalid stratum {stratum:?}").into());
        }
        Ok(self.expose(count, index, stratum))
    }

    /// Moves `count` susceptibles to exposed at the frontier and samples a
    /// schedule for each; clamped by the susceptibles available.
    fn expose(&mut self, count: u64, node: usize, stratum: Stratum) -> u64 {
        if count == 0 {
            return 0;
        }
        let frontier = self.store.num_times() - 1;
        if self.cached_time != Some(frontier) {
            if self.time == 0 && self.cached_time.is_none() {
                debug!("precomputing at beginning of simulation");
            } else {
                warn!("precomputing during simulation; should not be necessary");
            }
            self.precompute(frontier);
        }

        let exposed = self.store.transition(
            count as f64,
            Variable::Susceptible,
            Variable::Exposed,
            frontier,
            node,
            stratum,
        ) as u64;

        for _ in 0..exposed {
            let mut schedule = Schedule::new(self.now, stratum, &self.params, &mut self.rng);
            self.add_contact_events(&mut schedule, node, stratum);
            self.queues[node].push(schedule);
        }

        exposed
    }

    /// Lays contact events over the schedule's infectious window, one
    /// Poisson stream per target (age, risk). The target's vaccination
    /// status is resolved when the contact fires.
    fn add_contact_events(&mut self, schedule: &mut Schedule, node: usize, stratum: Stratum) {
        let node_population = self.population_nodes[node];
        if !(node_population > 0.0) {
            return;
        }
        let beta = self.params.beta();
        let (window_start, window_end) = schedule.infected_window();

        for age in 0..NUM_AGE_GROUPS {
            for risk in 0..NUM_RISK_GROUPS {
                let group = &self.populations[node][age][risk];
                let group_fraction = (group[0] + group[1]) / node_population;
                let rate = beta * CONTACT_RATES[stratum.age][age] * SIGMA[age] * group_fraction;

                let mut window = window_start;
                let mut next = window + self.rng.exponential(rate);
                while next < window_end {
                    schedule.push(Event::contact(
                        next,
                        window,
                        stratum,
                        ContactTarget { age, risk },
                    ));
                    window = next;
                    next = window + self.rng.exponential(rate);
                }
            }
        }
    }

    /// Advances the simulation one day, from `time` to `time + 1`.
    pub fn simulate(&mut self) {
        let t = self.time;
        self.now = t as f64;

        self.store.copy_forward(t);
        self.stockpiles.evolve(t);

        // Daily counters reset each morning; a day can run several
        // treatment passes.
        for var in [
            Variable::TreatedDaily,
            Variable::TreatedIneffectiveDaily,
            Variable::VaccinatedDaily,
        ] {
            self.store.zero_variable(var, t + 1);
        }

        // Configured priority groups first, then any residual stockpile
        // pro-rata over the whole population.
        let antiviral_selections = self.params.antiviral_priority_groups.clone();
        let vaccine_selections = self.params.vaccine_priority_groups.clone();
        let everyone = PriorityGroupSelections::everyone();
        self.apply_antivirals(&antiviral_selections);
        self.apply_antivirals(&everyone);
        self.apply_vaccines(&vaccine_selections);
        self.apply_vaccines(&everyone);

        // Caches must follow the treatments: vaccination moves people
        // between strata.
        self.precompute(t + 1);

        let horizon = (t + 1) as f64;
        for node in 0..self.num_nodes() {
            while let Some(mut schedule) = self.queues[node].pop_due(horizon) {
                let event = schedule.pop().unwrap();
                self.now = event.time;
                self.process_event(node, &event, &mut schedule);
                if !schedule.is_empty() {
                    self.queues[node].push(schedule);
                }
            }
        }

        self.now = (t + 1) as f64;
        self.travel();

        if self.ili.is_some() {
            let mut infected = Vec::with_capacity(self.num_nodes());
            let mut population = Vec::with_capacity(self.num_nodes());
            for node in 0..self.num_nodes() {
                infected.push(
                    self.store.sum(Variable::Asymptomatic, t, node, StratumSelector::ALL)
                        + self.store.sum(Variable::Treatable, t, node, StratumSelector::ALL)
                        + self.store.sum(Variable::Infectious, t, node, StratumSelector::ALL),
                );
                population.push(self.store.sum(
                    Variable::Population,
                    t,
                    node,
                    StratumSelector::ALL,
                ));
            }
            if let Some(ili) = &mut self.ili {
                ili.observe(&infected, &population, &mut self.rng);
            }
        }

        self.time = t + 1;
    }

    fn process_event(&mut self, node: usize, event: &Event, schedule: &mut Schedule) {
        let t1 = self.time + 1;

        if let Some((from_var, to_var, state)) = event.event_type.transition() {
            self.store
                .transition(1.0, from_var, to_var, t1, node, event.from);
            schedule.set_state(state);
            return;
        }

        // Contact dispatch.
        let Some(target) = event.to else {
            error!("contact event without a target stratum");
            return;
        };
        let node_id = self.scenario.nodes[node].id;
        let day = self.now as u32;

        let npi = combined_effectiveness(&self.params.npis, node_id, day, event.from.age, target.age);
        if npi > 0.0 && self.rng.uniform() <= npi {
            return;
        }

        // Resolve whether the contacted individual is vaccinated by
        // drawing an index into the (age, risk) group.
        let group = &self.populations[node][target.age][target.risk];
        let age_risk_population = (group[0] + group[1]) as u64;
        if age_risk_population == 0 {
            return;
        }
        let vaccinated_population = group[1] as u64;
        let contact = self.rng.uniform_int(age_risk_population);

        let mut vax = 0;
        if vaccinated_population >= contact {
            vax = 1;

            let latency_population =
                self.vaccinated_in_latency_window(node, target.age, target.risk) as u64;
            if latency_population < contact {
                // Past the latency window, so the vaccine gets its chance.
                if self.rng.uniform() <= self.params.vaccine_effectiveness {
                    return;
                }
            }
        }

        let target_stratum = Stratum::new(target.age, target.risk, vax);
        let mut target_population = self.populations[node][target.age][target.risk][vax] as i64;
        if event.from == target_stratum {
            // The source cannot contact themselves.
            target_population -= 1;
        }
        if target_population > 0 {
            let contact = self.rng.uniform_int(target_population as u64);
            let susceptible = self.store.value(Variable::Susceptible, t1, node, target_stratum) as u64;
            if susceptible >= contact {
                self.expose(1, node, target_stratum);
            }
        }
    }

    /// People vaccinated within the last `vaccine_latency_period` days,
    /// counted at the `t+1` frontier: vaccinations land in the morning
    /// bin of the day being simulated.
    fn vaccinated_in_latency_window(&self, node: usize, age: usize, risk: usize) -> f64 {
        let latency = self.params.vaccine_latency_period as usize;
        let t1 = self.time + 1;
        let stratum = Stratum::new(age, risk, 1);
        let mut total = 0.0;
        for back in 0..latency {
            if back > t1 {
                break;
            }
            total += self.store.value(Variable::VaccinatedDaily, t1 - back, node, stratum);
        }
        total
    }

    /// Daily antiviral pass for one priority-group selection: debit the
    /// stockpile, distribute courses pro-rata over the selection's strata
    /// by adherent-treatable share, move the effectively treated to
    /// recovered, and cancel a matching number of schedules.
    fn apply_antivirals(&mut self, selections: &PriorityGroupSelections) {
        if selections.is_empty() {
            debug!("no priority groups in selection");
            return;
        }
        let effectiveness = self.params.antiviral_effectiveness;
        let adherence = self.params.antiviral_adherence;
        let capacity = self.params.antiviral_capacity;
        let t1 = self.time + 1;
        let strata = selections.strata();

        for node in 0..self.num_nodes() {
            let stockpile = self.stockpiles.available(t1, node, Resource::Antivirals);
            if stockpile == 0 {
                continue;
            }

            let total_treatable = self.store.sum_set(Variable::Treatable, t1, node, &strata)
                - self
                    .store
                    .sum_set(Variable::TreatedIneffectiveDaily, t1, node, &strata);
            if total_treatable <= 0.0 {
                continue;
            }

            // The treatable period is one day, which keeps the adherence
            // arithmetic simple.
            let total_adherent_treatable = adherence * total_treatable;

            let mut used = stockpile.min(total_adherent_treatable as u64);

            // Capacity covers the whole node population, not just the
            // selection, and is shared across the passes of one day.
            let capacity_population =
                self.store
                    .sum(Variable::Population, t1, node, StratumSelector::ALL);
            let today_used =
                self.store
                    .sum(Variable::TreatedDaily, t1, node, StratumSelector::ALL);
            let capacity_room = (capacity * capacity_population - today_used) as i64;
            if used as i64 > capacity_room {
                used = capacity_room.max(0) as u64;
            }
            if used == 0 {
                continue;
            }

            self.stockpiles.debit(t1, node, Resource::Antivirals, used);

            let mut treated =
                [[[0u64; NUM_VACCINATED_GROUPS]; NUM_RISK_GROUPS]; NUM_AGE_GROUPS];
            let mut effective =
                [[[0i64; NUM_VACCINATED_GROUPS]; NUM_RISK_GROUPS]; NUM_AGE_GROUPS];
            let mut treatable_remaining =
                [[[0.0f64; NUM_VACCINATED_GROUPS]; NUM_RISK_GROUPS]; NUM_AGE_GROUPS];

            for s in &strata {
                let treatable = self.store.value(Variable::Treatable, t1, node, *s)
                    - self
                        .store
                        .value(Variable::TreatedIneffectiveDaily, t1, node, *s);
                if treatable <= 0.0 {
                    continue;
                }

                let adherent_treatable = adherence * treatable;
                let n_treated =
                    (adherent_treatable / total_adherent_treatable * used as f64) as u64;
                let n_effective = (effectiveness * n_treated as f64) as u64;

                treated[s.age][s.risk][s.vax] = n_treated;
                effective[s.age][s.risk][s.vax] = n_effective as i64;
                treatable_remaining[s.age][s.risk][s.vax] = treatable;

                if n_treated == 0 {
                    continue;
                }

                self.store.transition(
                    n_effective as f64,
                    Variable::Treatable,
                    Variable::Recovered,
                    t1,
                    node,
                    *s,
                );
                self.store
                    .add_value(Variable::TreatedDaily, t1, node, *s, n_treated as f64);
                self.store.add_value(
                    Variable::TreatedIneffectiveDaily,
                    t1,
                    node,
                    *s,
                    (n_treated - n_effective) as f64,
                );
                self.store
                    .add_value(Variable::Treated, t1, node, *s, n_treated as f64);
            }

            // Pro-rata floors can under-allocate.
            let total_treated: u64 = treated.iter().flatten().flatten().sum();
            if total_treated != used {
                warn!(
                    "treated {total_treated} != stockpile used {used} at node index {node}"
                );
            }

            // Cancel the schedules of the effectively treated. The
            // Bernoulli walk removes the right number in expectation and
            // almost always exactly; a residual is warned about below.
            let mut remaining: i64 = effective.iter().flatten().flatten().sum();
            let queues = &mut self.queues;
            let rng = &mut self.rng;
            for schedule in queues[node].iter_mut() {
                if remaining <= 0 {
                    break;
                }
                if schedule.state() != DiseaseState::Treatable {
                    continue;
                }
                let s = schedule.stratum();
                if effective[s.age][s.risk][s.vax] > 0 {
                    if !schedule.canceled()
                        && rng.uniform()
                            <= effective[s.age][s.risk][s.vax] as f64
                                / treatable_remaining[s.age][s.risk][s.vax]
                    {
                        schedule.cancel();
                        effective[s.age][s.risk][s.vax] -= 1;
                        remaining -= 1;
                    }
                    treatable_remaining[s.age][s.risk][s.vax] -= 1.0;
                }
            }
            if remaining != 0 {
                warn!(
                    "antiviral cancellation walk left {remaining} effective treatments unmatched at node index {node}"
                );
            }
        }
    }

    /// Daily vaccine pass for one priority-group selection: move counts
    /// from the unvaccinated to the vaccinated stratum across all live
    /// compartments, and rewrite the stratification of a matching number
    /// of schedules. Susceptibles have no schedules, so their move is
    /// counts only.
    fn apply_vaccines(&mut self, selections: &PriorityGroupSelections) {
        if selections.is_empty() {
            debug!("no priority groups in selection");
            return;
        }
        let adherence = self.params.vaccine_adherence;
        let capacity = self.params.vaccine_capacity;
        let t1 = self.time + 1;
        let pairs = selections.age_risk_pairs();

        for node in 0..self.num_nodes() {
            let stockpile = self.stockpiles.available(t1, node, Resource::Vaccines);
            if stockpile == 0 {
                continue;
            }

            let mut total_population = 0.0;
            let mut total_vaccinated = 0.0;
            let mut total_unvaccinated = 0.0;
            for &(age, risk) in &pairs {
                total_population +=
                    self.store
                        .sum(Variable::Population, t1, node, StratumSelector::age_risk(age, risk));
                total_vaccinated +=
                    self.store
                        .value(Variable::Population, t1, node, Stratum::new(age, risk, 1));
                total_unvaccinated +=
                    self.store
                        .value(Variable::Population, t1, node, Stratum::new(age, risk, 0));
            }
            if total_unvaccinated <= 0.0 {
                continue;
            }

            // Those already vaccinated count against the adherent pool.
            let total_adherent_unvaccinated = adherence * total_population - total_vaccinated;

            let mut used = stockpile;
            if used as f64 > total_adherent_unvaccinated {
                used = total_adherent_unvaccinated.max(0.0) as u64;
            }

            let capacity_population =
                self.store
                    .sum(Variable::Population, t1, node, StratumSelector::ALL);
            let today_used = self.store.sum(
                Variable::VaccinatedDaily,
                t1,
                node,
                StratumSelector::ALL.with_vax(1),
            );
            let capacity_room = (capacity * capacity_population - today_used) as i64;
            if used as i64 > capacity_room {
                used = capacity_room.max(0) as u64;
            }
            if used == 0 {
                continue;
            }

            self.stockpiles.debit(t1, node, Resource::Vaccines, used);

            // Allocation per (compartment, age, risk), pro-rata by the
            // adherent unvaccinated share of each cell.
            let mut vaccinated = [[[0i64; NUM_RISK_GROUPS]; NUM_AGE_GROUPS]; 6];
            let mut vaccinatable = [[[0i64; NUM_RISK_GROUPS]; NUM_AGE_GROUPS]; 6];

            for (c, compartment) in VACCINATED_COMPARTMENTS.iter().enumerate() {
                for &(age, risk) in &pairs {
                    let unvaccinated_stratum = Stratum::new(age, risk, 0);
                    let vaccinated_stratum = Stratum::new(age, risk, 1);

                    let population = self.store.sum(
                        Variable::Population,
                        t1,
                        node,
                        StratumSelector::age_risk(age, risk),
                    );
                    let vaccinated_population =
                        self.store
                            .value(Variable::Population, t1, node, vaccinated_stratum);
                    let unvaccinated_population =
                        self.store
                            .value(Variable::Population, t1, node, unvaccinated_stratum);
                    let compartment_unvaccinated =
                        self.store.value(*compartment, t1, node, unvaccinated_stratum);

                    vaccinatable[c][age][risk] = compartment_unvaccinated as i64;

                    if unvaccinated_population <= 0.0 {
                        continue;
                    }

                    // (adherent unvaccinated) x (fraction of the
                    // unvaccinated that sit in this compartment)
                    let adherent = (adherence * population - vaccinated_population)
                        * compartment_unvaccinated
                        / unvaccinated_population;
                    let count =
                        (adherent / total_adherent_unvaccinated * used as f64) as i64;
                    vaccinated[c][age][risk] = count;
                    if count <= 0 {
                        continue;
                    }

                    let moved = self.store.shift(
                        count as f64,
                        *compartment,
                        t1,
                        node,
                        unvaccinated_stratum,
                        vaccinated_stratum,
                    );
                    // People change stratum, not just compartment.
                    self.store.shift(
                        moved,
                        Variable::Population,
                        t1,
                        node,
                        unvaccinated_stratum,
                        vaccinated_stratum,
                    );
                    self.store
                        .add_value(Variable::VaccinatedDaily, t1, node, vaccinated_stratum, moved);
                }
            }

            let total_vaccinated_count: i64 = vaccinated.iter().flatten().flatten().sum();
            if total_vaccinated_count != used as i64 {
                warn!(
                    "vaccinated {total_vaccinated_count} != stockpile used {used} at node index {node}"
                );
            }

            // Rewrite schedule stratifications for the vaccinated who are
            // already scheduled. The queue key is unchanged: vaccination
            // does not move the next event time. The remaining total
            // includes susceptibles, who never have schedules, so the walk
            // usually visits the whole queue.
            let mut remaining = total_vaccinated_count;
            let queues = &mut self.queues;
            let rng = &mut self.rng;
            for schedule in queues[node].iter_mut() {
                if remaining <= 0 {
                    break;
                }
                let Some(c) = vaccinated_compartment_index(schedule.state()) else {
                    continue;
                };
                let s = schedule.stratum();
                if s.vax == 1 {
                    continue;
                }
                if vaccinated[c][s.age][s.risk] > 0 {
                    if !schedule.canceled()
                        && rng.uniform()
                            <= vaccinated[c][s.age][s.risk] as f64
                                / vaccinatable[c][s.age][s.risk] as f64
                    {
                        schedule.restratify(Stratum::new(s.age, s.risk, 1));
                        vaccinated[c][s.age][s.risk] -= 1;
                        remaining -= 1;
                    }
                    vaccinatable[c][s.age][s.risk] -= 1;
                }
            }
        }
    }

    /// Daily travel step: for every sink node accumulate an exposure
    /// probability per age from every other node's transmitting
    /// population, then draw binomial exposures per sink stratum.
    fn travel(&mut self) {
        let beta = self.params.beta();
        let vaccine_effectiveness = self.params.vaccine_effectiveness;
        let t1 = self.time + 1;
        let day = self.now as u32;
        let num_nodes = self.num_nodes();

        for sink in 0..num_nodes {
            let population_sink = self.population_nodes[sink];
            if !(population_sink > 0.0) {
                continue;
            }
            let sink_id = self.scenario.nodes[sink].id;
            let mut exposure_probability = [0.0f64; NUM_AGE_GROUPS];

            for source in 0..num_nodes {
                if source == sink {
                    continue;
                }
                let population_source = self.population_nodes[source];
                if !(population_source > 0.0) {
                    continue;
                }
                let travel_to_source = self.scenario.travel_fraction(sink, source);
                let travel_to_sink = self.scenario.travel_fraction(source, sink);
                if travel_to_source <= 0.0 && travel_to_sink <= 0.0 {
                    continue;
                }
                let source_id = self.scenario.nodes[source].id;

                let mut asymptomatic = [0.0f64; NUM_AGE_GROUPS];
                let mut transmitting = [0.0f64; NUM_AGE_GROUPS];
                for age in 0..NUM_AGE_GROUPS {
                    let selector = StratumSelector::age(age);
                    let asymptomatic_count =
                        self.store.sum(Variable::Asymptomatic, t1, source, selector);
                    asymptomatic[age] = asymptomatic_count;
                    transmitting[age] = asymptomatic_count
                        + self.store.sum(Variable::Treatable, t1, source, selector)
                        + self.store.sum(Variable::Infectious, t1, source, selector);
                }

                for a in 0..NUM_AGE_GROUPS {
                    let mut contacts_visiting = 0.0;
                    let mut contacts_visited = 0.0;
                    for b in 0..NUM_AGE_GROUPS {
                        let contact_rate = CONTACT_RATES[a][b];
                        let npi_at_sink =
                            combined_effectiveness(&self.params.npis, sink_id, day, a, b);
                        let npi_at_source =
                            combined_effectiveness(&self.params.npis, source_id, day, a, b);
                        // Sink residents visiting the source meet everyone
                        // transmitting there; of the source's residents,
                        // only the asymptomatic are well enough to make
                        // the reverse trip.
                        contacts_visiting += (1.0 - npi_at_source)
                            * transmitting[b]
                            * beta
                            * TRAVEL_RHO
                            * contact_rate
                            * SIGMA[a]
                            / AGE_FLOW_REDUCTION[a];
                        contacts_visited += (1.0 - npi_at_sink)
                            * asymptomatic[b]
                            * beta
                            * TRAVEL_RHO
                            * contact_rate
                            * SIGMA[a]
                            / AGE_FLOW_REDUCTION[b];
                    }
                    exposure_probability[a] += travel_to_source * contacts_visiting
                        / population_source
                        + travel_to_sink * contacts_visited / population_sink;
                }
            }

            for age in 0..NUM_AGE_GROUPS {
                for risk in 0..NUM_RISK_GROUPS {
                    for vax in 0..NUM_VACCINATED_GROUPS {
                        let mut probability = exposure_probability[age];
                        if vax == 1 {
                            let vaccinated_population = self.populations[sink][age][risk][1];
                            if vaccinated_population > 0.0 {
                                let in_latency =
                                    self.vaccinated_in_latency_window(sink, age, risk);
                                // Effectiveness weighted by the fraction
                                // of the vaccinated past the latency
                                // window.
                                let effective_vaccine_effectiveness = vaccine_effectiveness
                                    * (vaccinated_population - in_latency)
                                    / vaccinated_population;
                                probability *= 1.0 - effective_vaccine_effectiveness;
                            }
                        }

                        let stratum = Stratum::new(age, risk, vax);
                        let susceptible = (self
                            .store
                            .value(Variable::Susceptible, t1, sink, stratum)
                            + 0.5) as u64;
                        if susceptible > 0 {
                            let exposures = self.rng.binomial(susceptible, probability);
                            self.expose(exposures, sink, stratum);
                        }
                    }
                }
            }
        }
    }

    /// Rebuilds the per-node population caches from frame `t`.
    fn precompute(&mut self, t: usize) {
        self.cached_time = Some(t);
        for node in 0..self.num_nodes() {
            self.population_nodes[node] =
                self.store
                    .sum(Variable::Population, t, node, StratumSelector::ALL);
            for stratum in Stratum::all() {
                self.populations[node][stratum.age][stratum.risk][stratum.vax] =
                    self.store.value(Variable::Population, t, node, stratum);
            }
        }
    }

    /// Checks that for every scheduled state the frontier compartment
    /// counts equal the number of matching non-canceled schedules. Warns
    /// and returns `false` on drift. Expensive; meant for tests and
    /// debugging sessions.
    pub fn verify_schedule_counts(&self) -> bool {
        let frontier = self.store.num_times() - 1;
        let scheduled_states = [
            (Variable::Exposed, DiseaseState::Exposed),
            (Variable::Asymptomatic, DiseaseState::Asymptomatic),
            (Variable::Treatable, DiseaseState::Treatable),
            (Variable::Infectious, DiseaseState::Infectious),
        ];
        let mut verified = true;
        for node in 0..self.num_nodes() {
            for stratum in Stratum::all() {
                for (var, state) in scheduled_states {
                    let counted = self.store.value(var, frontier, node, stratum) as usize;
                    let scheduled = self.queues[node].count_matching(state, stratum);
                    if counted != scheduled {
                        warn!(
                            "{} {counted} != {scheduled} scheduled at node index {node} {stratum:?}",
                            var.name()
                        );
                        verified = false;
                    }
                }
            }
        }
        verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{InitialCases, NodeSpec};

    fn single_node(population_per_cell: f64) -> Scenario {
        Scenario {
            nodes: vec![NodeSpec {
                id: NodeId(1),
                name: "Travis".to_string(),
                population: [[population_per_cell; NUM_RISK_GROUPS]; NUM_AGE_GROUPS],
                antiviral_stockpile: 0,
                vaccine_stockpile: 0,
            }],
            travel: Vec::new(),
            deliveries: Vec::new(),
            initial_cases: Vec::new(),
        }
    }

    fn conserved(simulation: &Simulation, t: usize, node: NodeId) -> bool {
        let compartments: f64 = crate::variables::COMPARTMENTS
            .iter()
            .map(|var| {
                simulation
                    .value(*var, t, node, StratumSelector::ALL)
                    .unwrap()
            })
            .sum();
        let population = simulation
            .value(Variable::Population, t, node, StratumSelector::ALL)
            .unwrap();
        (compartments - population).abs() < 1e-6
    }

    #[test]
    fn construction_fills_t0() {
        let simulation = Simulation::new(single_node(100.0), Parameters::default(), 0).unwrap();
        assert_eq!(simulation.num_times(), 1);
        assert_eq!(
            simulation
                .value(Variable::Susceptible, 0, NodeId(1), StratumSelector::ALL)
                .unwrap(),
            1000.0
        );
        assert!(conserved(&simulation, 0, NodeId(1)));
        assert_eq!(simulation.node_name(NodeId(1)).unwrap(), "Travis");
        assert!(simulation.node_name(NodeId(9)).is_err());
    }

    #[test]
    fn initial_cases_move_susceptibles_and_schedule() {
        let mut simulation =
            Simulation::new(single_node(100.0), Parameters::default(), 42).unwrap();
        let exposed = simulation
            .initial_cases(NodeId(1), Stratum::new(0, 0, 0), 5)
            .unwrap();
        assert_eq!(exposed, 5);
        assert_eq!(
            simulation
                .value(Variable::Exposed, 0, NodeId(1), StratumSelector::ALL)
                .unwrap(),
            5.0
        );
        assert!(conserved(&simulation, 0, NodeId(1)));
        assert!(simulation.verify_schedule_counts());
    }

    #[test]
    fn initial_cases_clamp_to_available() {
        let mut simulation = Simulation::new(single_node(2.0), Parameters::default(), 42).unwrap();
        let exposed = simulation
            .initial_cases(NodeId(1), Stratum::new(0, 0, 0), 10)
            .unwrap();
        assert_eq!(exposed, 2);
        assert!(conserved(&simulation, 0, NodeId(1)));
    }

    #[test]
    fn initial_cases_reject_bad_inputs() {
        let mut simulation =
            Simulation::new(single_node(100.0), Parameters::default(), 42).unwrap();
        assert!(simulation
            .initial_cases(NodeId(9), Stratum::new(0, 0, 0), 1)
            .is_err());
        assert!(simulation
            .initial_cases(NodeId(1), Stratum::new(5, 0, 0), 1)
            .is_err());
    }

    #[test]
    fn scenario_seeds_initial_cases() {
        let mut scenario = single_node(100.0);
        scenario.initial_cases.push(InitialCases {
            node: NodeId(1),
            age: 2,
            risk: 0,
            count: 3,
        });
        let simulation = Simulation::new(scenario, Parameters::default(), 42).unwrap();
        assert_eq!(
            simulation
                .value(Variable::Exposed, 0, NodeId(1), StratumSelector::age(2))
                .unwrap(),
            3.0
        );
    }

    #[test]
    fn a_day_advances_time_and_conserves() {
        let mut simulation =
            Simulation::new(single_node(100.0), Parameters::default(), 42).unwrap();
        simulation
            .initial_cases(NodeId(1), Stratum::new(1, 0, 0), 10)
            .unwrap();
        for _ in 0..10 {
            simulation.simulate();
            assert!(conserved(&simulation, simulation.time(), NodeId(1)));
        }
        assert_eq!(simulation.time(), 10);
        assert_eq!(simulation.num_times(), 11);
        assert!(simulation.verify_schedule_counts());
    }

    #[test]
    fn derived_variables() {
        let mut simulation =
            Simulation::new(single_node(100.0), Parameters::default(), 42).unwrap();
        simulation
            .initial_cases(NodeId(1), Stratum::new(1, 0, 0), 10)
            .unwrap();
        for _ in 0..20 {
            simulation.simulate();
        }
        let t = simulation.time();
        let infected = simulation
            .derived(DerivedVariable::AllInfected, t, NodeId(1), StratumSelector::ALL)
            .unwrap();
        let by_hand = simulation
            .value(Variable::Asymptomatic, t, NodeId(1), StratumSelector::ALL)
            .unwrap()
            + simulation
                .value(Variable::Treatable, t, NodeId(1), StratumSelector::ALL)
                .unwrap()
            + simulation
                .value(Variable::Infectious, t, NodeId(1), StratumSelector::ALL)
                .unwrap();
        assert_eq!(infected, by_hand);

        // Nobody vaccinated: the latency and effective pools stay empty.
        assert_eq!(
            simulation
                .derived(
                    DerivedVariable::VaccinatedInLatencyPeriod,
                    t,
                    NodeId(1),
                    StratumSelector::ALL
                )
                .unwrap(),
            0.0
        );
        assert_eq!(
            simulation
                .derived(
                    DerivedVariable::VaccinatedEffective,
                    t,
                    NodeId(1),
                    StratumSelector::ALL
                )
                .unwrap(),
            0.0
        );
        // ILI is disabled by default.
        assert!(simulation
            .derived(DerivedVariable::IliReports, t, NodeId(1), StratumSelector::ALL)
            .is_err());
    }

    #[test]
    fn derived_variable_names_round_trip() {
        for var in DerivedVariable::ALL {
            assert_eq!(var.name().parse::<DerivedVariable>().unwrap(), var);
        }
        assert!("attack rate".parse::<DerivedVariable>().is_err());
    }
}
