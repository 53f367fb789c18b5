use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::domain::{
    Assembly, AssemblyClosure, AssemblyFilter, AssemblyMinutes, AssemblyStatus, AssemblyUpdate,
    Attendee, AttendanceType, DigitalSignature, MinutesStatus, NewAssembly, NewAttendance,
    NewVote, NewVoting, OptionResult, QuorumSnapshot, QuorumStatus, SignatureContext,
    SignatureStatus, Signer, Vote, Voting, VotingResults, VotingStatus,
};
use super::minutes::{render_minutes, DocumentRenderer, SignatureProvider, SignatureRequest};
use super::rules::{default_options, is_approved, share, tally, Tally};
use crate::config::AssemblyConfig;
use crate::error::{require_text, ServiceError};
use crate::notifications::{publish, ActivityLogger, EventPublisher, RealtimeEvent};
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

/// Tenant-wide channel carrying assembly convocations.
pub const ASSEMBLIES_CHANNEL: &str = "assemblies";

fn manager_only(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "only administrators can {action}"
        )))
    }
}

fn check_coefficient(field: &'static str, value: f64) -> Result<(), ServiceError> {
    if value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(ServiceError::validation(field, "must be greater than 0 and at most 100"))
    }
}

fn expect_status(
    assembly: &Assembly,
    allowed: &[AssemblyStatus],
    action: &str,
) -> Result<(), ServiceError> {
    if allowed.contains(&assembly.status) {
        Ok(())
    } else {
        Err(ServiceError::invalid_state(format!(
            "cannot {action} an assembly with status {}",
            assembly.status.label()
        )))
    }
}

fn expect_voting(voting: &Voting, status: VotingStatus, action: &str) -> Result<(), ServiceError> {
    if voting.status == status {
        Ok(())
    } else {
        Err(ServiceError::invalid_state(format!(
            "cannot {action} a voting with status {}",
            voting.status.label()
        )))
    }
}

/// Assembly lifecycle: convocation, attendance and quorum, votings, minutes and signatures.
#[derive(Clone)]
pub struct AssemblyService {
    assemblies: Arc<dyn Repository<Assembly>>,
    attendees: Arc<dyn Repository<Attendee>>,
    votings: Arc<dyn Repository<Voting>>,
    votes: Arc<dyn Repository<Vote>>,
    minutes: Arc<dyn Repository<AssemblyMinutes>>,
    signatures: Arc<dyn Repository<DigitalSignature>>,
    publisher: Arc<dyn EventPublisher>,
    activity: Arc<ActivityLogger>,
    renderer: Arc<dyn DocumentRenderer>,
    signer: Arc<dyn SignatureProvider>,
    config: AssemblyConfig,
}

impl AssemblyService {
    pub fn new(
        database: &Database,
        publisher: Arc<dyn EventPublisher>,
        activity: Arc<ActivityLogger>,
        renderer: Arc<dyn DocumentRenderer>,
        signer: Arc<dyn SignatureProvider>,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            assemblies: database.assemblies.clone(),
            attendees: database.attendees.clone(),
            votings: database.votings.clone(),
            votes: database.votes.clone(),
            minutes: database.minutes.clone(),
            signatures: database.signatures.clone(),
            publisher,
            activity,
            renderer,
            signer,
            config,
        }
    }

    fn emit(&self, schema: &SchemaName, assembly: &Assembly, event_type: &str, payload: Value) {
        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new(event_type, assembly.realtime_channel.clone(), payload),
        );
    }

    pub fn create_assembly(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewAssembly,
    ) -> Result<Assembly, ServiceError> {
        manager_only(actor, "convene assemblies")?;
        let title = require_text("title", &input.title)?;
        let location = require_text("location", &input.location)?;
        check_coefficient("required_coefficient", input.required_coefficient)?;
        for item in &input.agenda {
            require_text("agenda", &item.topic)?;
        }

        let now = Utc::now();
        let created = self.assemblies.insert(
            schema,
            Assembly {
                id: 0,
                title,
                description: input.description,
                assembly_type: input.assembly_type,
                status: AssemblyStatus::Scheduled,
                date: input.date,
                location,
                agenda: input.agenda,
                required_coefficient: input.required_coefficient,
                current_coefficient: 0.0,
                quorum_status: QuorumStatus::NotReached,
                quorum_reached_at: None,
                realtime_channel: String::new(),
                created_by: actor.user_id,
                end_time: None,
                conclusions: None,
                created_at: now,
                updated_at: now,
            },
        )?;
        let mut assembly = created;
        assembly.realtime_channel = format!("assembly-{}-{}", schema, assembly.id);
        let assembly = self.assemblies.update(schema, assembly)?;

        tracing::info!(%schema, assembly_id = assembly.id, "assembly convened");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_ASSEMBLY",
            "assembly",
            assembly.id,
            json!({ "title": assembly.title, "date": assembly.date }),
        );
        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new(
                "ASSEMBLY_CONVOCATION",
                ASSEMBLIES_CHANNEL,
                json!({
                    "assembly_id": assembly.id,
                    "title": assembly.title,
                    "date": assembly.date,
                    "location": assembly.location,
                    "realtime_channel": assembly.realtime_channel,
                }),
            ),
        );
        Ok(assembly)
    }

    pub fn list_assemblies(
        &self,
        schema: &SchemaName,
        filter: &AssemblyFilter,
    ) -> Result<Vec<Assembly>, ServiceError> {
        let mut assemblies = self.assemblies.find(schema, &|assembly| {
            filter.status.map_or(true, |status| assembly.status == status)
        })?;
        assemblies.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(assemblies)
    }

    pub fn get_assembly(&self, schema: &SchemaName, id: u64) -> Result<Assembly, ServiceError> {
        require(self.assemblies.as_ref(), schema, id)
    }

    pub fn update_assembly(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: AssemblyUpdate,
    ) -> Result<Assembly, ServiceError> {
        manager_only(actor, "edit assemblies")?;
        let stored = self.assemblies.modify(schema, id, &mut |assembly| {
            expect_status(assembly, &[AssemblyStatus::Scheduled], "edit")?;
            if let Some(title) = update.title.as_deref() {
                assembly.title = require_text("title", title)?;
            }
            if update.description.is_some() {
                assembly.description = update.description.clone();
            }
            if let Some(kind) = update.assembly_type {
                assembly.assembly_type = kind;
            }
            if let Some(date) = update.date {
                assembly.date = date;
            }
            if let Some(location) = update.location.as_deref() {
                assembly.location = require_text("location", location)?;
            }
            if let Some(agenda) = &update.agenda {
                for item in agenda {
                    require_text("agenda", &item.topic)?;
                }
                assembly.agenda = agenda.clone();
            }
            if let Some(required) = update.required_coefficient {
                check_coefficient("required_coefficient", required)?;
                assembly.required_coefficient = required;
            }
            if update.conclusions.is_some() {
                assembly.conclusions = update.conclusions.clone();
            }
            assembly.updated_at = Utc::now();
            Ok(())
        })?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_ASSEMBLY",
            "assembly",
            id,
            json!({}),
        );
        if update.required_coefficient.is_some() {
            self.update_quorum(schema, id)?;
            return self.get_assembly(schema, id);
        }
        Ok(stored)
    }

    pub fn delete_assembly(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Assembly, ServiceError> {
        manager_only(actor, "delete assemblies")?;
        let assembly = require(self.assemblies.as_ref(), schema, id)?;
        if !matches!(
            assembly.status,
            AssemblyStatus::Scheduled | AssemblyStatus::Cancelled
        ) {
            return Err(ServiceError::invalid_state(format!(
                "cannot delete an assembly with status {}",
                assembly.status.label()
            )));
        }
        for attendee in self.attendees_of(schema, id)? {
            self.attendees.delete(schema, attendee.id)?;
        }
        let removed = self.assemblies.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_ASSEMBLY",
            "assembly",
            id,
            json!({ "title": removed.title }),
        );
        Ok(removed)
    }

    pub fn cancel_assembly(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Assembly, ServiceError> {
        manager_only(actor, "cancel assemblies")?;
        let stored = self.assemblies.modify(schema, id, &mut |assembly| {
            expect_status(assembly, &[AssemblyStatus::Scheduled], "cancel")?;
            assembly.status = AssemblyStatus::Cancelled;
            assembly.updated_at = Utc::now();
            Ok(())
        })?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CANCEL_ASSEMBLY",
            "assembly",
            id,
            json!({}),
        );
        Ok(stored)
    }

    fn attendees_of(&self, schema: &SchemaName, assembly_id: u64) -> Result<Vec<Attendee>, ServiceError> {
        Ok(self
            .attendees
            .find(schema, &|attendee| attendee.assembly_id == assembly_id)?)
    }

    pub fn register_attendance(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        assembly_id: u64,
        input: NewAttendance,
    ) -> Result<Attendee, ServiceError> {
        if !actor.is_admin() && input.user_id != actor.user_id {
            return Err(ServiceError::forbidden(
                "attendance can only be registered for yourself",
            ));
        }
        let assembly = require(self.assemblies.as_ref(), schema, assembly_id)?;
        if !matches!(
            assembly.status,
            AssemblyStatus::Scheduled | AssemblyStatus::InProgress
        ) {
            return Err(ServiceError::invalid_state(format!(
                "cannot register attendance for an assembly with status {}",
                assembly.status.label()
            )));
        }
        check_coefficient("coefficient", input.coefficient)?;
        if input.attendance_type == AttendanceType::Proxy && input.proxy_user_id.is_none() {
            return Err(ServiceError::validation(
                "proxy_user_id",
                "proxy attendance needs the proxy holder",
            ));
        }

        let unit = input.property_unit_id;
        let attendee = Attendee {
            id: 0,
            assembly_id,
            user_id: input.user_id,
            property_unit_id: unit,
            coefficient: input.coefficient,
            attendance_type: input.attendance_type,
            proxy_user_id: input.proxy_user_id,
            proxy_document_url: input.proxy_document_url,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            checked_in_at: Utc::now(),
        };
        let stored = self
            .attendees
            .insert_unique(schema, attendee, &|existing| {
                existing.assembly_id == assembly_id && existing.property_unit_id == unit
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => ServiceError::conflict(format!(
                    "property unit {unit} is already registered in assembly {assembly_id}"
                )),
                other => other.into(),
            })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "REGISTER_ATTENDANCE",
            "assembly",
            assembly_id,
            json!({
                "attendee_id": stored.id,
                "property_unit_id": unit,
                "coefficient": stored.coefficient,
            }),
        );
        self.update_quorum(schema, assembly_id)?;
        Ok(stored)
    }

    /// Recomputes the present coefficient and announces the first time quorum is reached.
    ///
    /// Only the quorum fields are written, so a concurrent start or edit is kept.
    pub fn update_quorum(
        &self,
        schema: &SchemaName,
        assembly_id: u64,
    ) -> Result<QuorumSnapshot, ServiceError> {
        let mut present = 0;
        let mut current = 0.0;
        let mut was_reached = false;
        let assembly = self.assemblies.modify(schema, assembly_id, &mut |assembly| {
            let rows = self.attendees.find(schema, &|attendee| attendee.assembly_id == assembly_id)?;
            present = rows.len();
            current = rows.iter().map(|attendee| attendee.coefficient).sum();
            was_reached = assembly.quorum_status == QuorumStatus::Reached;

            let reached = current >= assembly.required_coefficient;
            assembly.current_coefficient = current;
            assembly.quorum_status = if reached {
                QuorumStatus::Reached
            } else {
                QuorumStatus::NotReached
            };
            if reached && assembly.quorum_reached_at.is_none() {
                assembly.quorum_reached_at = Some(Utc::now());
            }
            assembly.updated_at = Utc::now();
            Ok(())
        })?;
        let snapshot = snapshot(&assembly, present);

        if assembly.quorum_status == QuorumStatus::Reached && !was_reached {
            tracing::info!(%schema, assembly_id, current, "quorum reached");
            self.emit(
                schema,
                &assembly,
                "QUORUM_REACHED",
                json!({
                    "assembly_id": assembly_id,
                    "current_coefficient": current,
                    "required_coefficient": assembly.required_coefficient,
                    "percentage": snapshot.percentage,
                }),
            );
            self.activity.record(
                schema,
                None,
                "QUORUM_REACHED",
                "assembly",
                assembly_id,
                json!({ "current_coefficient": current }),
            );
        }
        Ok(snapshot)
    }

    pub fn quorum_status(
        &self,
        schema: &SchemaName,
        assembly_id: u64,
    ) -> Result<QuorumSnapshot, ServiceError> {
        let assembly = require(self.assemblies.as_ref(), schema, assembly_id)?;
        let attendees = self.attendees_of(schema, assembly_id)?.len();
        Ok(snapshot(&assembly, attendees))
    }

    pub fn start_assembly(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Assembly, ServiceError> {
        manager_only(actor, "start assemblies")?;
        let now = Utc::now();
        let assembly = self.assemblies.modify(schema, id, &mut |assembly| {
            expect_status(assembly, &[AssemblyStatus::Scheduled], "start")?;
            if assembly.quorum_status != QuorumStatus::Reached {
                return Err(ServiceError::invalid_state(
                    "cannot start the assembly before quorum is reached",
                ));
            }
            assembly.status = AssemblyStatus::InProgress;
            assembly.updated_at = now;
            Ok(())
        })?;

        tracing::info!(%schema, assembly_id = id, "assembly started");
        self.emit(
            schema,
            &assembly,
            "ASSEMBLY_STARTED",
            json!({ "assembly_id": id, "start_time": now }),
        );
        self.activity.record(
            schema,
            Some(actor.user_id),
            "START_ASSEMBLY",
            "assembly",
            id,
            json!({
                "quorum": {
                    "current": assembly.current_coefficient,
                    "required": assembly.required_coefficient,
                }
            }),
        );
        Ok(assembly)
    }

    pub fn create_voting(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        assembly_id: u64,
        input: NewVoting,
    ) -> Result<Voting, ServiceError> {
        manager_only(actor, "open votings")?;
        let assembly = require(self.assemblies.as_ref(), schema, assembly_id)?;
        if assembly.status != AssemblyStatus::InProgress {
            return Err(ServiceError::invalid_state(format!(
                "cannot create a voting in an assembly with status {}",
                assembly.status.label()
            )));
        }
        let title = require_text("title", &input.title)?;

        let options = if input.options.is_empty() {
            default_options()
        } else {
            let mut seen = HashSet::new();
            let mut options = Vec::with_capacity(input.options.len());
            for option in &input.options {
                let option = require_text("options", option)?;
                if !seen.insert(option.clone()) {
                    return Err(ServiceError::validation(
                        "options",
                        format!("duplicate option {option}"),
                    ));
                }
                options.push(option);
            }
            options
        };

        if input.voting_type.needs_percentage() {
            match input.required_percentage {
                Some(required) => check_coefficient("required_percentage", required)?,
                None => {
                    return Err(ServiceError::validation(
                        "required_percentage",
                        format!("{} votings need a required percentage", input.voting_type.label()),
                    ))
                }
            }
        }

        let agenda_len = assembly.agenda.len() as u32;
        if input.agenda_point == 0 || (agenda_len > 0 && input.agenda_point > agenda_len) {
            return Err(ServiceError::validation(
                "agenda_point",
                format!("must reference an agenda item between 1 and {}", agenda_len.max(1)),
            ));
        }

        let empty = tally(&options, &[]);
        let stored = self.votings.insert(
            schema,
            Voting {
                id: 0,
                assembly_id,
                agenda_point: input.agenda_point,
                title,
                description: input.description,
                voting_type: input.voting_type,
                options,
                required_percentage: input.required_percentage,
                base_for_percentage: input.base_for_percentage,
                status: VotingStatus::Pending,
                start_time: None,
                end_time: None,
                total_votes: 0,
                total_coefficient_voted: 0.0,
                result: empty.options,
                is_approved: None,
            },
        )?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_VOTING",
            "voting",
            stored.id,
            json!({
                "assembly_id": assembly_id,
                "title": stored.title,
                "type": stored.voting_type,
            }),
        );
        Ok(stored)
    }

    fn voting_with_assembly(
        &self,
        schema: &SchemaName,
        voting_id: u64,
    ) -> Result<(Voting, Assembly), ServiceError> {
        let voting = require(self.votings.as_ref(), schema, voting_id)?;
        let assembly = require(self.assemblies.as_ref(), schema, voting.assembly_id)?;
        Ok((voting, assembly))
    }

    pub fn start_voting(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        voting_id: u64,
    ) -> Result<Voting, ServiceError> {
        manager_only(actor, "start votings")?;
        let (_, assembly) = self.voting_with_assembly(schema, voting_id)?;
        if assembly.status != AssemblyStatus::InProgress {
            return Err(ServiceError::invalid_state(format!(
                "cannot start a voting in an assembly with status {}",
                assembly.status.label()
            )));
        }

        let voting = self.votings.modify(schema, voting_id, &mut |voting| {
            expect_voting(voting, VotingStatus::Pending, "start")?;
            voting.status = VotingStatus::Active;
            voting.start_time = Some(Utc::now());
            Ok(())
        })?;

        self.emit(
            schema,
            &assembly,
            "VOTING_STARTED",
            json!({
                "voting_id": voting.id,
                "assembly_id": assembly.id,
                "title": voting.title,
                "options": voting.options,
                "start_time": voting.start_time,
            }),
        );
        self.activity.record(
            schema,
            Some(actor.user_id),
            "START_VOTING",
            "voting",
            voting_id,
            json!({ "assembly_id": assembly.id }),
        );
        Ok(voting)
    }

    fn recount(&self, schema: &SchemaName, voting: &mut Voting) -> Result<Tally, ServiceError> {
        let voting_id = voting.id;
        let votes = self.votes.find(schema, &|vote| vote.voting_id == voting_id)?;
        let counted = tally(&voting.options, &votes);
        voting.total_votes = counted.total_votes;
        voting.total_coefficient_voted = counted.total_coefficient;
        voting.result = counted.options.clone();
        Ok(counted)
    }

    pub fn cast_vote(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        voting_id: u64,
        input: NewVote,
    ) -> Result<Vote, ServiceError> {
        let (voting, assembly) = self.voting_with_assembly(schema, voting_id)?;
        expect_voting(&voting, VotingStatus::Active, "vote in")?;
        let attendee = self
            .attendees
            .fetch(schema, input.attendee_id)?
            .filter(|attendee| attendee.assembly_id == voting.assembly_id)
            .ok_or_else(|| {
                ServiceError::validation(
                    "attendee_id",
                    "attendee is not registered in this assembly",
                )
            })?;
        if !actor.is_admin() && !attendee.may_vote_as(actor.user_id) {
            return Err(ServiceError::forbidden(
                "only the attendee or their proxy can vote for this unit",
            ));
        }
        let value = input.value.trim().to_string();
        if !voting.options.contains(&value) {
            return Err(ServiceError::validation(
                "value",
                "is not one of the voting options",
            ));
        }

        // The vote is stored and counted while the voting row is held, so a concurrent
        // close either sees it or rejects it.
        let attendee_id = attendee.id;
        let mut cast = None;
        let voting = self.votings.modify(schema, voting_id, &mut |voting| {
            expect_voting(voting, VotingStatus::Active, "vote in")?;
            let vote = self
                .votes
                .insert_unique(
                    schema,
                    Vote {
                        id: 0,
                        voting_id,
                        attendee_id,
                        user_id: actor.user_id,
                        property_unit_id: attendee.property_unit_id,
                        coefficient: attendee.coefficient,
                        value: value.clone(),
                        comments: input.comments.clone(),
                        ip_address: input.ip_address.clone(),
                        user_agent: input.user_agent.clone(),
                        cast_at: Utc::now(),
                    },
                    &|existing| {
                        existing.voting_id == voting_id && existing.attendee_id == attendee_id
                    },
                )
                .map_err(|err| match err {
                    RepositoryError::Conflict => {
                        ServiceError::conflict("this attendee has already voted")
                    }
                    other => other.into(),
                })?;
            self.recount(schema, voting)?;
            cast = Some(vote);
            Ok(())
        })?;
        let stored = cast.ok_or_else(|| ServiceError::invalid_state("vote was not recorded"))?;

        self.emit(
            schema,
            &assembly,
            "VOTE_CAST",
            json!({ "voting_id": voting_id, "total_votes": voting.total_votes }),
        );
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CAST_VOTE",
            "voting",
            voting_id,
            json!({
                "assembly_id": assembly.id,
                "property_unit_id": stored.property_unit_id,
            }),
        );
        Ok(stored)
    }

    pub fn voting_results(
        &self,
        schema: &SchemaName,
        voting_id: u64,
    ) -> Result<VotingResults, ServiceError> {
        let mut voting = require(self.votings.as_ref(), schema, voting_id)?;
        let counted = self.recount(schema, &mut voting)?;
        Ok(results(&voting, &counted))
    }

    pub fn close_voting(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        voting_id: u64,
    ) -> Result<Voting, ServiceError> {
        manager_only(actor, "close votings")?;
        let (_, assembly) = self.voting_with_assembly(schema, voting_id)?;
        let mut approved = false;
        let voting = self.votings.modify(schema, voting_id, &mut |voting| {
            expect_voting(voting, VotingStatus::Active, "close")?;
            let counted = self.recount(schema, voting)?;
            approved = is_approved(
                voting.voting_type,
                voting.required_percentage,
                voting.base_for_percentage,
                assembly.required_coefficient,
                &counted,
            );
            voting.status = VotingStatus::Closed;
            voting.end_time = Some(Utc::now());
            voting.is_approved = Some(approved);
            Ok(())
        })?;

        tracing::info!(%schema, voting_id, approved, total_votes = voting.total_votes, "voting closed");
        self.emit(
            schema,
            &assembly,
            "VOTING_CLOSED",
            json!({
                "voting_id": voting_id,
                "assembly_id": assembly.id,
                "result": voting.result,
                "is_approved": approved,
                "end_time": voting.end_time,
            }),
        );
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CLOSE_VOTING",
            "voting",
            voting_id,
            json!({ "assembly_id": assembly.id, "is_approved": approved }),
        );
        Ok(voting)
    }

    /// Completes the assembly, opens its minutes and schedules their generation.
    ///
    /// Generation runs on the blocking pool when a tokio runtime is present, inline otherwise.
    pub fn end_assembly(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<AssemblyClosure, ServiceError> {
        manager_only(actor, "end assemblies")?;
        let now = Utc::now();
        let assembly = self.assemblies.modify(schema, id, &mut |assembly| {
            expect_status(assembly, &[AssemblyStatus::InProgress], "end")?;
            let active = self.votings.find(schema, &|voting| {
                voting.assembly_id == id && voting.status == VotingStatus::Active
            })?;
            if !active.is_empty() {
                return Err(ServiceError::invalid_state(
                    "cannot end the assembly while votings are active",
                ));
            }
            assembly.status = AssemblyStatus::Completed;
            assembly.end_time = Some(now);
            assembly.updated_at = now;
            Ok(())
        })?;

        tracing::info!(%schema, assembly_id = id, "assembly ended");
        self.emit(
            schema,
            &assembly,
            "ASSEMBLY_ENDED",
            json!({ "assembly_id": id, "end_time": now }),
        );
        self.activity.record(
            schema,
            Some(actor.user_id),
            "END_ASSEMBLY",
            "assembly",
            id,
            json!({ "duration_minutes": (now - assembly.date).num_minutes() }),
        );

        let minutes = self.initialize_minutes(schema, actor, id)?;
        self.schedule_minutes_generation(schema, minutes.id);
        Ok(AssemblyClosure { assembly, minutes })
    }

    fn schedule_minutes_generation(&self, schema: &SchemaName, minutes_id: u64) {
        let service = self.clone();
        let schema = schema.clone();
        let job = move || {
            // Failures are recorded on the minutes row itself.
            let _ = service.generate_minutes_content(&schema, minutes_id);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }

    pub fn initialize_minutes(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        assembly_id: u64,
    ) -> Result<AssemblyMinutes, ServiceError> {
        let assembly = require(self.assemblies.as_ref(), schema, assembly_id)?;
        if assembly.status != AssemblyStatus::Completed {
            return Err(ServiceError::invalid_state(format!(
                "cannot open minutes for an assembly with status {}",
                assembly.status.label()
            )));
        }

        let stored = self
            .minutes
            .insert_unique(
                schema,
                AssemblyMinutes {
                    id: 0,
                    assembly_id,
                    status: MinutesStatus::Generating,
                    content: None,
                    pdf_url: None,
                    signed_pdf_url: None,
                    signatures_required: self.config.signatures_required,
                    signatures_completed: 0,
                    generated_at: None,
                    generation_log: None,
                },
                &|existing| existing.assembly_id == assembly_id,
            )
            .map_err(|err| match err {
                RepositoryError::Conflict => ServiceError::conflict(format!(
                    "minutes already exist for assembly {assembly_id}"
                )),
                other => other.into(),
            })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "INITIALIZE_MINUTES",
            "assembly_minutes",
            stored.id,
            json!({ "assembly_id": assembly_id }),
        );
        Ok(stored)
    }

    /// Renders the minutes and their document; failures leave the minutes FAILED.
    pub fn generate_minutes_content(
        &self,
        schema: &SchemaName,
        minutes_id: u64,
    ) -> Result<AssemblyMinutes, ServiceError> {
        let minutes = require(self.minutes.as_ref(), schema, minutes_id)?;
        if minutes.status != MinutesStatus::Generating {
            return Err(ServiceError::invalid_state(format!(
                "cannot generate minutes with status {}",
                minutes.status.label()
            )));
        }
        match self.render_and_store(schema, minutes_id) {
            Ok(minutes) => Ok(minutes),
            Err(err) => {
                tracing::error!(%schema, minutes_id, error = %err, "minutes generation failed");
                let log = format!("Error: {err}");
                let flagged = self.minutes.modify(schema, minutes_id, &mut |minutes| {
                    minutes.status = MinutesStatus::Failed;
                    minutes.generation_log = Some(log.clone());
                    Ok(())
                });
                if let Err(store_err) = flagged {
                    tracing::warn!(%schema, minutes_id, error = %store_err, "could not flag minutes as failed");
                }
                Err(err)
            }
        }
    }

    fn render_and_store(
        &self,
        schema: &SchemaName,
        minutes_id: u64,
    ) -> Result<AssemblyMinutes, ServiceError> {
        let minutes = require(self.minutes.as_ref(), schema, minutes_id)?;
        let assembly = require(self.assemblies.as_ref(), schema, minutes.assembly_id)?;
        let mut attendees = self.attendees_of(schema, assembly.id)?;
        attendees.sort_by_key(|attendee| attendee.property_unit_id);
        let assembly_id = assembly.id;
        let mut votings = self
            .votings
            .find(schema, &|voting| voting.assembly_id == assembly_id)?;
        votings.sort_by_key(|voting| (voting.agenda_point, voting.id));

        let content = render_minutes(&assembly, &attendees, &votings);
        let minutes = self.minutes.modify(schema, minutes_id, &mut |minutes| {
            if minutes.status != MinutesStatus::Generating {
                return Err(ServiceError::invalid_state(format!(
                    "cannot generate minutes with status {}",
                    minutes.status.label()
                )));
            }
            minutes.content = Some(content.clone());
            minutes.status = MinutesStatus::Generated;
            minutes.generated_at = Some(Utc::now());
            Ok(())
        })?;

        let pdf_url = self
            .renderer
            .render_pdf(&assembly, &minutes)
            .map_err(|err| ServiceError::Document(err.to_string()))?;
        // Signers may have been registered meanwhile; only the document fields move.
        let minutes = self.minutes.modify(schema, minutes_id, &mut |minutes| {
            minutes.pdf_url = Some(pdf_url.clone());
            if minutes.status == MinutesStatus::Generated {
                minutes.status = MinutesStatus::Signing;
            }
            Ok(())
        })?;

        tracing::info!(%schema, minutes_id, assembly_id, "minutes generated");
        self.activity.record(
            schema,
            None,
            "GENERATE_MINUTES_CONTENT",
            "assembly_minutes",
            minutes_id,
            json!({ "assembly_id": assembly_id, "pdf_url": pdf_url }),
        );
        self.emit(
            schema,
            &assembly,
            "MINUTES_AVAILABLE",
            json!({
                "assembly_id": assembly_id,
                "minutes_id": minutes_id,
                "pdf_url": pdf_url,
            }),
        );
        Ok(minutes)
    }

    pub fn register_required_signers(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        minutes_id: u64,
        signers: Vec<Signer>,
    ) -> Result<Vec<DigitalSignature>, ServiceError> {
        manager_only(actor, "designate signers")?;
        if signers.is_empty() {
            return Err(ServiceError::validation("signers", "at least one signer is required"));
        }
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(signers.len());
        for signer in &signers {
            if !seen.insert(signer.user_id) {
                return Err(ServiceError::validation(
                    "signers",
                    format!("user {} is listed twice", signer.user_id),
                ));
            }
            rows.push(DigitalSignature {
                id: 0,
                minutes_id,
                signer_user_id: signer.user_id,
                signer_name: require_text("name", &signer.name)?,
                signer_role: require_text("role", &signer.role)?,
                status: SignatureStatus::Pending,
                signed_at: None,
                signature_data: None,
                ip_address: None,
                user_agent: None,
            });
        }

        let mut created = Vec::with_capacity(rows.len());
        self.minutes.modify(schema, minutes_id, &mut |minutes| {
            if !matches!(
                minutes.status,
                MinutesStatus::Generated | MinutesStatus::Signing
            ) {
                return Err(ServiceError::invalid_state(format!(
                    "cannot register signers for minutes with status {}",
                    minutes.status.label()
                )));
            }
            let registered = self
                .signatures
                .find(schema, &|signature| signature.minutes_id == minutes_id)?;
            if let Some(existing) = registered
                .iter()
                .find(|signature| seen.contains(&signature.signer_user_id))
            {
                return Err(ServiceError::conflict(format!(
                    "user {} is already a signer of these minutes",
                    existing.signer_user_id
                )));
            }
            for row in &rows {
                created.push(self.signatures.insert(schema, row.clone())?);
            }
            minutes.signatures_required = (registered.len() + created.len()) as u32;
            minutes.status = MinutesStatus::Signing;
            Ok(())
        })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "REGISTER_REQUIRED_SIGNERS",
            "assembly_minutes",
            minutes_id,
            json!({
                "signers": created
                    .iter()
                    .map(|signature| json!({
                        "user_id": signature.signer_user_id,
                        "role": signature.signer_role,
                    }))
                    .collect::<Vec<_>>(),
            }),
        );
        Ok(created)
    }

    pub fn sign_minutes(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        signature_id: u64,
        context: SignatureContext,
    ) -> Result<DigitalSignature, ServiceError> {
        let signature = require(self.signatures.as_ref(), schema, signature_id)?;
        if signature.signer_user_id != actor.user_id {
            return Err(ServiceError::forbidden(
                "only the designated signer can sign",
            ));
        }
        if signature.status != SignatureStatus::Pending {
            return Err(ServiceError::invalid_state(
                "this signature has already been collected",
            ));
        }
        let minutes = require(self.minutes.as_ref(), schema, signature.minutes_id)?;
        let document = match (&minutes.status, &minutes.pdf_url) {
            (MinutesStatus::Signing, Some(url)) => url.clone(),
            _ => {
                return Err(ServiceError::invalid_state(format!(
                    "cannot sign minutes with status {}",
                    minutes.status.label()
                )))
            }
        };

        let now = Utc::now();
        let data = self
            .signer
            .sign(&SignatureRequest {
                document: &document,
                signer_user_id: actor.user_id,
                role: &signature.signer_role,
                timestamp: now,
            })
            .map_err(|err| ServiceError::Document(err.to_string()))?;

        let signature = self.signatures.modify(schema, signature_id, &mut |signature| {
            if signature.status != SignatureStatus::Pending {
                return Err(ServiceError::invalid_state(
                    "this signature has already been collected",
                ));
            }
            signature.status = SignatureStatus::Signed;
            signature.signed_at = Some(now);
            signature.signature_data = Some(data.clone());
            signature.ip_address = context.ip_address.clone();
            signature.user_agent = context.user_agent.clone();
            Ok(())
        })?;

        let minutes_id = minutes.id;
        let minutes = self.minutes.modify(schema, minutes_id, &mut |minutes| {
            minutes.signatures_completed = self
                .signatures
                .find(schema, &|other| {
                    other.minutes_id == minutes_id && other.status == SignatureStatus::Signed
                })?
                .len() as u32;
            Ok(())
        })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "SIGN_MINUTES",
            "digital_signature",
            signature_id,
            json!({ "minutes_id": minutes_id, "role": signature.signer_role }),
        );
        // The signature is stored; a finalize failure leaves the minutes in SIGNING for a retry.
        if minutes.signatures_completed >= minutes.signatures_required {
            if let Err(err) = self.finalize_signed_minutes(schema, minutes_id) {
                tracing::warn!(%schema, minutes_id, error = %err, "minutes finalization deferred");
            }
        }
        Ok(signature)
    }

    /// Admin retry of a finalization that failed after the last signature.
    pub fn retry_finalization(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        minutes_id: u64,
    ) -> Result<AssemblyMinutes, ServiceError> {
        manager_only(actor, "finalize minutes")?;
        self.finalize_signed_minutes(schema, minutes_id)
    }

    pub fn finalize_signed_minutes(
        &self,
        schema: &SchemaName,
        minutes_id: u64,
    ) -> Result<AssemblyMinutes, ServiceError> {
        let current = require(self.minutes.as_ref(), schema, minutes_id)?;
        if current.status == MinutesStatus::Signed {
            return Ok(current);
        }
        let signatures = self.signatures_for(schema, minutes_id)?;
        if signatures.is_empty()
            || signatures
                .iter()
                .any(|signature| signature.status != SignatureStatus::Signed)
        {
            return Err(ServiceError::invalid_state(
                "cannot finalize minutes with pending signatures",
            ));
        }
        let pdf_url = current.pdf_url.clone().unwrap_or_default();
        let signed_url = self
            .signer
            .signed_document(&pdf_url, &signatures)
            .map_err(|err| ServiceError::Document(err.to_string()))?;

        let minutes = self.minutes.modify(schema, minutes_id, &mut |minutes| {
            if minutes.status != MinutesStatus::Signing {
                return Err(ServiceError::invalid_state(format!(
                    "cannot finalize minutes with status {}",
                    minutes.status.label()
                )));
            }
            minutes.status = MinutesStatus::Signed;
            minutes.signed_pdf_url = Some(signed_url.clone());
            Ok(())
        })?;
        let assembly = require(self.assemblies.as_ref(), schema, minutes.assembly_id)?;

        tracing::info!(%schema, minutes_id, assembly_id = assembly.id, "minutes signed");
        self.emit(
            schema,
            &assembly,
            "MINUTES_SIGNED",
            json!({
                "assembly_id": assembly.id,
                "minutes_id": minutes_id,
                "signed_pdf_url": signed_url,
            }),
        );
        self.activity.record(
            schema,
            None,
            "FINALIZE_SIGNED_MINUTES",
            "assembly_minutes",
            minutes_id,
            json!({ "assembly_id": assembly.id, "signed_pdf_url": signed_url }),
        );
        Ok(minutes)
    }

    pub fn minutes_for(
        &self,
        schema: &SchemaName,
        assembly_id: u64,
    ) -> Result<AssemblyMinutes, ServiceError> {
        require(self.assemblies.as_ref(), schema, assembly_id)?;
        self.minutes
            .find(schema, &|minutes| minutes.assembly_id == assembly_id)?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found("assembly minutes", assembly_id))
    }

    pub fn signatures_for(
        &self,
        schema: &SchemaName,
        minutes_id: u64,
    ) -> Result<Vec<DigitalSignature>, ServiceError> {
        require(self.minutes.as_ref(), schema, minutes_id)?;
        Ok(self
            .signatures
            .find(schema, &|signature| signature.minutes_id == minutes_id)?)
    }
}

fn snapshot(assembly: &Assembly, attendees: usize) -> QuorumSnapshot {
    let reached = assembly.quorum_status == QuorumStatus::Reached;
    QuorumSnapshot {
        current_coefficient: assembly.current_coefficient,
        required_coefficient: assembly.required_coefficient,
        quorum_status: assembly.quorum_status,
        quorum_reached: reached,
        percentage: share(assembly.current_coefficient, assembly.required_coefficient).round()
            as u32,
        attendees,
    }
}

fn results(voting: &Voting, counted: &Tally) -> VotingResults {
    let options = voting
        .options
        .iter()
        .map(|option| {
            let tally = counted.options.get(option).copied().unwrap_or_default();
            OptionResult {
                option: option.clone(),
                count: tally.count,
                coefficient: tally.coefficient,
                percentage: share(tally.coefficient, counted.total_coefficient),
            }
        })
        .collect();
    VotingResults {
        voting_id: voting.id,
        title: voting.title.clone(),
        status: voting.status,
        total_votes: counted.total_votes,
        total_coefficient_voted: counted.total_coefficient,
        options,
        is_approved: voting.is_approved,
    }
}
