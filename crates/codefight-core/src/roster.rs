//! Registered templates and the AI instances created from them.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::instruction::Instruction;
use crate::{EngineError, normalize};

new_key_type! {
    /// Stable handle for AI instances backed by a generational slot map.
    pub struct AiId;
}

/// Lifecycle state of an activated AI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AiStatus {
    Active,
    Stopped,
}

/// One activated AI. Pointer and counter freeze once it stops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiInstance {
    name: String,
    template: String,
    pointer: usize,
    counter: u64,
    status: AiStatus,
    program: Vec<Instruction>,
}

impl AiInstance {
    /// Instance name, suffixed with `#n` when its template was selected more than once.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Number of instructions this AI has completed.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[must_use]
    pub fn status(&self) -> AiStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AiStatus::Active
    }

    /// Starting program, owned by this instance.
    #[must_use]
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }
}

/// Template registry plus active and stopped instances.
///
/// Instances keep their activation order for their whole life, so stopped AIs are
/// listed in the order they were started rather than the order they died.
#[derive(Debug, Clone)]
pub struct Roster {
    memory_size: usize,
    max_players: usize,
    templates: BTreeMap<String, Vec<Instruction>>,
    instances: SlotMap<AiId, AiInstance>,
    by_name: HashMap<String, AiId>,
    order: Vec<AiId>,
}

impl Roster {
    /// Empty roster for an arena of `memory_size` cells.
    #[must_use]
    pub fn new(memory_size: usize, max_players: usize) -> Self {
        Self {
            memory_size,
            max_players,
            templates: BTreeMap::new(),
            instances: SlotMap::with_key(),
            by_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    #[must_use]
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Longest program a template may hold: half the arena, rounded up.
    #[must_use]
    pub fn max_program_len(&self) -> usize {
        self.memory_size.div_ceil(2)
    }

    /// Store `program` as the template `name`. Every cell becomes owned by `name`.
    pub fn register(&mut self, name: &str, program: Vec<Instruction>) -> Result<(), EngineError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(EngineError::ArgumentInvalid(format!(
                "AI name {name:?} must be non-empty and free of whitespace"
            )));
        }
        if self.templates.contains_key(name) {
            return Err(EngineError::AiCreation(format!("AI {name} already exists")));
        }
        if program.is_empty() {
            return Err(EngineError::AiCreation(format!("AI {name} has no instructions")));
        }
        if program.len() > self.max_program_len() {
            return Err(EngineError::AiCreation(format!(
                "AI {name} has {} instructions but at most {} are allowed",
                program.len(),
                self.max_program_len()
            )));
        }
        if !program.iter().any(Instruction::is_valid_first_instruction) {
            return Err(EngineError::AiCreation(format!(
                "AI {name} has no valid first instruction"
            )));
        }

        let program = program
            .into_iter()
            .map(|cell| cell.with_owner(name))
            .collect::<Vec<_>>();
        debug!(ai = name, len = program.len(), "registered AI");
        self.templates.insert(name.to_owned(), program);
        Ok(())
    }

    /// Remove a template, returning its program.
    pub fn unregister(&mut self, name: &str) -> Result<Vec<Instruction>, EngineError> {
        let program = self
            .templates
            .remove(name)
            .ok_or_else(|| EngineError::MissingAi(format!("AI {name} is not registered")))?;
        debug!(ai = name, "unregistered AI");
        Ok(program)
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Copy of the registered program for `name`.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<Vec<Instruction>> {
        self.templates.get(name).cloned()
    }

    /// Template names in lexical order.
    pub fn registered_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.templates.keys().map(String::as_str)
    }

    /// Create one active instance per entry of `names`, all or nothing.
    ///
    /// A template selected more than once yields `name#0`, `name#1`, ... in
    /// order of appearance.
    pub fn activate<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<AiId>, EngineError> {
        if names.len() > self.max_players {
            return Err(EngineError::AiCreation(format!(
                "{} AIs were selected but at most {} can play",
                names.len(),
                self.max_players
            )));
        }

        let mut selections: HashMap<&str, usize> = HashMap::new();
        for name in names {
            *selections.entry(name.as_ref()).or_default() += 1;
        }

        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();
        let mut pending = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let template = self
                .templates
                .get(name)
                .ok_or_else(|| EngineError::MissingAi(format!("AI {name} is not registered")))?;
            let instance_name = if selections.get(name).copied().unwrap_or_default() > 1 {
                let index = seen.entry(name).or_default();
                let suffixed = format!("{name}#{index}");
                *index += 1;
                suffixed
            } else {
                name.to_owned()
            };
            if self.by_name.contains_key(&instance_name) || !taken.insert(instance_name.clone()) {
                return Err(EngineError::AiCreation(format!(
                    "AI instance name {instance_name} is already in use"
                )));
            }
            let program = template
                .iter()
                .map(|cell| cell.clone().with_owner(instance_name.as_str()))
                .collect();
            pending.push(AiInstance {
                name: instance_name,
                template: name.to_owned(),
                pointer: 0,
                counter: 0,
                status: AiStatus::Active,
                program,
            });
        }

        let ids = pending
            .into_iter()
            .map(|instance| {
                let name = instance.name.clone();
                let id = self.instances.insert(instance);
                self.by_name.insert(name, id);
                self.order.push(id);
                id
            })
            .collect();
        Ok(ids)
    }

    /// Drop every instance; templates stay.
    pub fn clear_instances(&mut self) {
        self.instances.clear();
        self.by_name.clear();
        self.order.clear();
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<AiId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, id: AiId) -> Option<&AiInstance> {
        self.instances.get(id)
    }

    #[must_use]
    pub fn instance(&self, name: &str) -> Option<&AiInstance> {
        self.id(name).and_then(|id| self.instances.get(id))
    }

    /// Every instance in activation order.
    pub fn instances(&self) -> impl Iterator<Item = &AiInstance> + '_ {
        self.order.iter().filter_map(|id| self.instances.get(*id))
    }

    /// Active instances in activation order.
    pub fn active(&self) -> impl Iterator<Item = &AiInstance> + '_ {
        self.instances().filter(|instance| instance.is_active())
    }

    /// Stopped instances in activation order.
    pub fn stopped(&self) -> impl Iterator<Item = &AiInstance> + '_ {
        self.instances().filter(|instance| !instance.is_active())
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// The `index`-th active instance in activation order.
    #[must_use]
    pub fn nth_active(&self, index: usize) -> Option<&AiInstance> {
        self.active().nth(index)
    }

    fn active_mut(&mut self, name: &str) -> Result<&mut AiInstance, EngineError> {
        self.by_name
            .get(name)
            .and_then(|id| self.instances.get_mut(*id))
            .filter(|instance| instance.is_active())
            .ok_or_else(|| missing(name))
    }

    fn any_mut(&mut self, name: &str) -> Result<&mut AiInstance, EngineError> {
        self.by_name
            .get(name)
            .and_then(|id| self.instances.get_mut(*id))
            .ok_or_else(|| missing(name))
    }

    /// Pointer of an active AI.
    pub fn pointer(&self, name: &str) -> Result<usize, EngineError> {
        self.instance(name)
            .filter(|instance| instance.is_active())
            .map(AiInstance::pointer)
            .ok_or_else(|| missing(name))
    }

    /// Move an active AI's pointer to `pointer`, normalized into the arena.
    pub fn set_pointer(&mut self, name: &str, pointer: i64) -> Result<(), EngineError> {
        let size = self.memory_size;
        self.active_mut(name)?.pointer = normalize(pointer, size);
        Ok(())
    }

    /// Place an active AI's pointer, rejecting indices outside the arena.
    pub fn initialize_pointer(&mut self, name: &str, pointer: i64) -> Result<(), EngineError> {
        let size = self.memory_size;
        let address = usize::try_from(pointer)
            .ok()
            .filter(|&address| address < size)
            .ok_or(EngineError::MemoryOutOfBounds {
                index: pointer,
                size,
            })?;
        self.active_mut(name)?.pointer = address;
        Ok(())
    }

    /// Move an active AI to the stopped partition.
    pub fn stop(&mut self, name: &str) -> Result<(), EngineError> {
        self.active_mut(name)?.status = AiStatus::Stopped;
        debug!(ai = name, "AI stopped");
        Ok(())
    }

    pub fn increment_counter(&mut self, name: &str) -> Result<(), EngineError> {
        let instance = self.any_mut(name)?;
        instance.counter = instance.counter.saturating_add(1);
        Ok(())
    }

    pub fn counter(&self, name: &str) -> Result<u64, EngineError> {
        self.instance(name)
            .map(AiInstance::counter)
            .ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> EngineError {
    EngineError::MissingAi(format!("AI {name} is not in the current game"))
}
