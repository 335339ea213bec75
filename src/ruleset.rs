use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    sync::Arc,
};

use secl_eval::{
    CompileOpts, Context, ContextPool, EvalError, Event, EventType, Field, FieldValue, MacroId,
    MacroStore, Model, RuleId,
};

use crate::{
    DefinitionError, LoadErrors, RuleSetError,
    approvers::{Approvers, FieldCapabilities, FieldCapability},
    bucket::RuleBucket,
    definition::{MacroDefinition, Policy, RuleDefinition},
    listener::RuleSetListener,
    opts::Opts,
    rule::{Macro, Rule},
};

/// Builds the template events used to derive approvers.
pub type EventCtor = Box<dyn Fn() -> Box<dyn Event> + Send + Sync>;

/// Set of rules and macros, indexed by event type.
///
/// Rules are loaded once, with [RuleSet::add_macros] then
/// [RuleSet::add_rules]. Afterwards [RuleSet::evaluate] and
/// [RuleSet::is_discarder] can be called concurrently.
pub struct RuleSet {
    opts: Opts,
    model: Box<dyn Model>,
    event_ctor: EventCtor,
    macro_store: MacroStore,
    macros: HashMap<MacroId, Macro>,
    rules: HashMap<RuleId, Arc<Rule>>,
    event_rule_buckets: HashMap<EventType, RuleBucket>,
    fields: Vec<Field>,
    pool: ContextPool,
    loaded_policies: HashMap<String, String>,
    listeners: Vec<Arc<dyn RuleSetListener>>,
}

impl RuleSet {
    pub fn new<F>(model: Box<dyn Model>, event_ctor: F, opts: Opts) -> Self
    where
        F: Fn() -> Box<dyn Event> + Send + Sync + 'static,
    {
        Self {
            opts,
            model,
            event_ctor: Box::new(event_ctor),
            macro_store: MacroStore::new(),
            macros: HashMap::new(),
            rules: HashMap::new(),
            event_rule_buckets: HashMap::new(),
            fields: Vec::new(),
            pool: ContextPool::new(),
            loaded_policies: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn list_rule_ids(&self) -> Vec<RuleId> {
        self.rules.keys().cloned().collect()
    }

    pub fn list_macro_ids(&self) -> Vec<MacroId> {
        self.macros.keys().cloned().collect()
    }

    pub fn get_rules(&self) -> &HashMap<RuleId, Arc<Rule>> {
        &self.rules
    }

    pub fn get_macros(&self) -> &HashMap<MacroId, Macro> {
        &self.macros
    }

    /// Adds macros, in order, so that a macro can use the previous ones.
    /// Every failure is reported, the other macros stay loaded.
    pub fn add_macros<I>(&mut self, definitions: I) -> Result<(), LoadErrors>
    where
        I: IntoIterator<Item = MacroDefinition>,
    {
        let mut errors = LoadErrors::new();
        for definition in definitions {
            if let Err(err) = self.add_macro(definition) {
                log::warn!("{err}");
                errors.push(err);
            }
        }
        log::debug!("{} macros loaded, {} errors", self.macros.len(), errors.len());
        errors.into_result()
    }

    pub fn add_macro(&mut self, definition: MacroDefinition) -> Result<&Macro, RuleSetError> {
        let id = definition.id.clone();
        let entry = match self.macros.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(RuleSetError::macro_load(&id, DefinitionError::IdConflict));
            }
            Entry::Vacant(entry) => entry,
        };

        let mut compiled = secl_eval::Macro::new(&definition.id, &definition.expression);
        compiled
            .parse()
            .map_err(|err| RuleSetError::macro_load(&id, DefinitionError::Syntax(err)))?;

        let opts = CompileOpts {
            constants: &self.opts.constants,
            macros: &self.macro_store,
        };
        compiled
            .gen_evaluator(self.model.as_ref(), &opts)
            .map_err(|err| RuleSetError::macro_load(&id, DefinitionError::Compilation(err)))?;

        let inner = Arc::new(compiled);
        self.macro_store.insert(inner.clone());
        Ok(entry.insert(Macro { inner, definition }))
    }

    /// Adds rules then generates their partials. Every failure is reported,
    /// the other rules stay loaded.
    pub fn add_rules<I>(&mut self, definitions: I) -> Result<(), LoadErrors>
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        let mut errors = LoadErrors::new();
        for definition in definitions {
            if let Err(err) = self.add_rule(definition) {
                log::warn!("{err}");
                errors.push(err);
            }
        }

        if let Err(partial_errors) = self.gen_partials() {
            errors.extend(partial_errors);
        }

        log::debug!(
            "{} rules loaded in {} buckets, {} errors",
            self.rules.len(),
            self.event_rule_buckets.len(),
            errors.len()
        );
        errors.into_result()
    }

    pub fn add_rule(&mut self, definition: RuleDefinition) -> Result<Arc<Rule>, RuleSetError> {
        let id = definition.id.clone();
        if self.opts.is_reserved(&id) {
            return Err(RuleSetError::rule(&id, DefinitionError::ReservedId));
        }
        if self.rules.contains_key(&id) {
            return Err(RuleSetError::rule(&id, DefinitionError::IdConflict));
        }

        let mut compiled =
            secl_eval::Rule::new(&definition.id, &definition.expression, definition.get_tags());
        compiled
            .parse()
            .map_err(|err| RuleSetError::rule(&id, DefinitionError::Syntax(err)))?;

        let opts = CompileOpts {
            constants: &self.opts.constants,
            macros: &self.macro_store,
        };
        compiled
            .gen_evaluator(self.model.as_ref(), &opts)
            .map_err(|err| RuleSetError::rule(&id, DefinitionError::Compilation(err)))?;

        let event_type =
            Self::get_rule_event_type(&compiled).map_err(|err| RuleSetError::rule(&id, err))?;
        if !self.opts.is_event_type_enabled(&event_type) {
            return Err(RuleSetError::rule(
                &id,
                DefinitionError::EventTypeNotEnabled(event_type),
            ));
        }

        let rule = Arc::new(Rule {
            inner: compiled,
            event_type,
            definition,
        });

        self.event_rule_buckets
            .entry(rule.event_type.clone())
            .or_insert_with(|| RuleBucket::new(&rule.event_type))
            .add_rule(rule.clone());
        self.add_fields(rule.get_fields());
        self.rules.insert(id, rule.clone());

        Ok(rule)
    }

    /// Generates the partials of every loaded rule. Already generated
    /// partials are kept.
    pub fn gen_partials(&self) -> Result<(), LoadErrors> {
        let mut errors = LoadErrors::new();
        for bucket in self.event_rule_buckets.values() {
            for rule in bucket.get_rules() {
                if let Err(err) = rule.inner.gen_partials() {
                    let err = RuleSetError::rule(rule.id(), DefinitionError::Partials(err));
                    log::warn!("{err}");
                    errors.push(err);
                }
            }
        }
        errors.into_result()
    }

    /// The single event type of a compiled rule.
    pub fn get_rule_event_type(rule: &secl_eval::Rule) -> Result<EventType, DefinitionError> {
        let event_types = rule
            .get_event_types()
            .map_err(DefinitionError::Compilation)?;

        match event_types {
            [] => Err(DefinitionError::NoEvent),
            [event_type] => Ok(event_type.clone()),
            _ => Err(DefinitionError::MultipleEvents(event_types.to_vec())),
        }
    }

    /// Merges `fields` into the fields referenced by the rule set.
    pub fn add_fields(&mut self, fields: &[Field]) {
        for field in fields {
            if !self.fields.contains(field) {
                self.fields.push(field.clone());
            }
        }
    }

    /// Distinct fields referenced by the rules, in order of appearance.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Records the version of a loaded policy file.
    pub fn add_policy_version(&mut self, filename: &str, version: &str) {
        self.loaded_policies
            .insert(filename.replace('.', "_"), version.to_string());
    }

    /// Records the version of a loaded policy.
    pub fn add_policy(&mut self, policy: &Policy) {
        self.add_policy_version(&policy.name, &policy.version);
    }

    pub fn loaded_policies(&self) -> &HashMap<String, String> {
        &self.loaded_policies
    }

    pub fn add_listener(&mut self, listener: Arc<dyn RuleSetListener>) {
        self.listeners.push(listener);
    }

    pub fn notify_rule_match(&self, rule: &Rule, event: &dyn Event) {
        for listener in &self.listeners {
            listener.rule_match(rule, event);
        }
    }

    pub fn notify_discarder_found(&self, event: &dyn Event, field: &str, event_type: &str) {
        for listener in &self.listeners {
            listener.event_discarder_found(self, event, field, event_type);
        }
    }

    pub fn has_rules_for_event_type(&self, event_type: &str) -> bool {
        self.event_rule_buckets
            .get(event_type)
            .is_some_and(|bucket| !bucket.is_empty())
    }

    pub fn get_bucket(&self, event_type: &str) -> Option<&RuleBucket> {
        self.event_rule_buckets.get(event_type)
    }

    /// Event types having at least one rule.
    pub fn get_event_types(&self) -> Vec<EventType> {
        self.event_rule_buckets.keys().cloned().collect()
    }

    /// Approvers of every event type having capabilities. Event types whose
    /// approvers can't be derived are left out.
    pub fn get_approvers(
        &self,
        field_caps: &HashMap<EventType, FieldCapabilities>,
    ) -> HashMap<EventType, Approvers> {
        let mut approvers = HashMap::new();
        for event_type in self.event_rule_buckets.keys() {
            let Some(caps) = field_caps.get(event_type) else {
                continue;
            };
            match self.get_event_approvers(event_type, caps) {
                Ok(event_approvers) => {
                    approvers.insert(event_type.clone(), event_approvers);
                }
                Err(err) => log::debug!("skipping approvers of `{event_type}`: {err}"),
            }
        }
        approvers
    }

    pub fn get_event_approvers(
        &self,
        event_type: &str,
        field_caps: &[FieldCapability],
    ) -> Result<Approvers, RuleSetError> {
        let bucket = self
            .event_rule_buckets
            .get(event_type)
            .ok_or_else(|| RuleSetError::NoEventTypeBucket(event_type.to_string()))?;

        let mut event = (self.event_ctor)();
        bucket.get_approvers(event.as_mut(), field_caps)
    }

    /// Every literal the rules compare `field` against, rule by rule. A value
    /// used by several rules is listed once per rule.
    pub fn get_field_values(&self, field: &str) -> Vec<FieldValue> {
        self.rules
            .values()
            .flat_map(|rule| rule.evaluator().get_field_values(field))
            .collect()
    }

    /// Whether the value of `field` on `event` can't satisfy any rule of its
    /// event type, whatever the other fields are.
    pub fn is_discarder(&self, event: &dyn Event, field: &str) -> Result<bool, RuleSetError> {
        let event_type = event.get_field_event_type(field)?;
        let bucket = self
            .event_rule_buckets
            .get(&event_type)
            .ok_or(RuleSetError::NoEventTypeBucket(event_type))?;

        let ctx = self.pool.get(event);
        Ok(discards(bucket, &ctx, field)?)
    }

    /// Evaluates `event` against the rules of its type and notifies the
    /// listeners of every match. Without match, discarders are looked up.
    pub fn evaluate(&self, event: &dyn Event) -> bool {
        let ctx = self.pool.get(event);

        let event_type = event.get_type();
        let Some(bucket) = self.event_rule_buckets.get(event_type) else {
            log::trace!("no rule for event type `{event_type}`");
            return false;
        };
        log::trace!(
            "evaluating `{event_type}` event against {} rules",
            bucket.len()
        );

        let mut result = false;
        for rule in bucket.get_rules() {
            if rule.inner.eval(&ctx) {
                log::trace!("rule `{}` matches {event:?}", rule.id());
                self.notify_rule_match(rule, event);
                result = true;
            }
        }

        if !result {
            for field in bucket.fields() {
                if !self.opts.is_discarder_supported(field) {
                    continue;
                }
                match discards(bucket, &ctx, field) {
                    Ok(true) => {
                        log::trace!("discarder found on {field} for `{event_type}`");
                        self.notify_discarder_found(event, field, event_type);
                    }
                    Ok(false) => {}
                    Err(err) => log::trace!("discarder lookup on {field} failed: {err}"),
                }
            }
        }

        result
    }
}

/// True when no rule of `bucket` can match with the current value of `field`.
fn discards(bucket: &RuleBucket, ctx: &Context, field: &str) -> Result<bool, EvalError> {
    for rule in bucket.get_rules() {
        if rule.inner.partial_eval(ctx, field)? {
            return Ok(false);
        }
    }
    Ok(true)
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("opts", &self.opts)
            .field("rules", &self.rules.len())
            .field("macros", &self.macros.len())
            .field("event_types", &self.get_event_types())
            .field("fields", &self.fields)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
