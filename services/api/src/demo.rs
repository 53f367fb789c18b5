use armonia::app::{Integrations, Services};
use armonia::assembly::{
    AgendaItem, AssemblyMinutes, AssemblyService, AssemblyType, AttendanceType, Attendee,
    MinutesStatus, NewAssembly, NewAttendance, NewVote, NewVoting, PercentageBase,
    SignatureContext, Signer, VotingResults, VotingType, ABSTAIN, NO, YES,
};
use armonia::config::AssemblyConfig;
use armonia::error::AppError;
use armonia::inventory::{NewProperty, PropertyStatus, PropertyType};
use armonia::notifications::{EventPublisher, PublishError, RealtimeEvent};
use armonia::store::Database;
use armonia::tenancy::{Actor, SchemaName};
use chrono::{Duration, Utc};
use clap::Args;
use std::sync::Arc;

const DEMO_ADMIN: u64 = 1;
const DEMO_COMPLEX: u64 = 1;

/// Owners registered by the walkthrough: (user, unit number, coefficient).
const OWNERS: [(u64, &str, f64); 4] = [
    (11, "101", 20.0),
    (12, "102", 18.0),
    (13, "201", 15.0),
    (14, "202", 12.0),
];

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Tenant schema the walkthrough runs under
    #[arg(long, default_value = "conjunto_demo", value_parser = parse_schema)]
    pub(crate) schema: SchemaName,
    /// Minimum coefficient (percent) needed to open the assembly
    #[arg(long, default_value_t = 51.0)]
    pub(crate) required_coefficient: f64,
}

fn parse_schema(raw: &str) -> Result<SchemaName, String> {
    SchemaName::parse(raw).map_err(|err| err.to_string())
}

/// Prints each broadcast instead of fanning it out.
struct ConsolePublisher;

impl EventPublisher for ConsolePublisher {
    fn broadcast(&self, _schema: &SchemaName, event: RealtimeEvent) -> Result<(), PublishError> {
        println!("    [{}] {} {}", event.channel, event.event_type, event.payload);
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        schema,
        required_coefficient,
    } = args;

    let config = AssemblyConfig::default();
    let integrations = Integrations::in_process(Arc::new(ConsolePublisher), &config);
    let services = Services::new(&Database::in_memory(), integrations, config);
    let assemblies = services.assemblies.as_ref();
    let admin = Actor::admin(DEMO_ADMIN);

    println!("Armonía assembly walkthrough for tenant {schema}");

    println!("\n1. Units");
    let mut units = Vec::with_capacity(OWNERS.len());
    for (user_id, unit_number, coefficient) in OWNERS {
        let property = services.inventory.create_property(
            &schema,
            &admin,
            NewProperty {
                complex_id: DEMO_COMPLEX,
                unit_number: unit_number.to_string(),
                property_type: PropertyType::Apartment,
                status: PropertyStatus::Occupied,
                area: Some(72.5),
                block: None,
                zone: None,
                owner_id: Some(user_id),
                owner_name: Some(format!("Propietario {unit_number}")),
                coefficient,
            },
        )?;
        println!(
            "- Unit {} owned by user {user_id} ({coefficient:.2}%)",
            property.unit_number
        );
        units.push((user_id, property));
    }

    println!("\n2. Convocation");
    let assembly = assemblies.create_assembly(
        &schema,
        &admin,
        NewAssembly {
            title: "Asamblea ordinaria anual".to_string(),
            description: Some("Aprobación de presupuesto y obras".to_string()),
            assembly_type: AssemblyType::Ordinary,
            date: Utc::now() + Duration::days(15),
            location: "Salón comunal".to_string(),
            agenda: vec![
                AgendaItem {
                    topic: "Presupuesto anual".to_string(),
                    description: None,
                },
                AgendaItem {
                    topic: "Impermeabilización de cubiertas".to_string(),
                    description: Some("Cuota extraordinaria".to_string()),
                },
            ],
            required_coefficient,
        },
    )?;
    println!(
        "- Assembly {} '{}' on channel {}",
        assembly.id, assembly.title, assembly.realtime_channel
    );

    println!("\n3. Attendance and quorum");
    let mut attendees = Vec::with_capacity(units.len());
    for (user_id, property) in &units {
        let user_id = *user_id;
        let attendee = assemblies.register_attendance(
            &schema,
            &Actor::resident(user_id),
            assembly.id,
            NewAttendance {
                user_id,
                property_unit_id: property.id,
                coefficient: property.coefficient,
                attendance_type: AttendanceType::InPerson,
                proxy_user_id: None,
                proxy_document_url: None,
                ip_address: None,
                user_agent: None,
            },
        )?;
        println!(
            "- Unit {} checked in with {:.2}%",
            property.unit_number, attendee.coefficient
        );
        attendees.push(attendee);
    }
    let quorum = assemblies.quorum_status(&schema, assembly.id)?;
    println!(
        "- Quorum {:?}: {:.2}% present of {:.2}% required ({} attendees)",
        quorum.quorum_status,
        quorum.current_coefficient,
        quorum.required_coefficient,
        quorum.attendees
    );

    println!("\n4. Session");
    assemblies.start_assembly(&schema, &admin, assembly.id)?;
    println!("- Assembly started");

    let budget = assemblies.create_voting(
        &schema,
        &admin,
        assembly.id,
        NewVoting {
            agenda_point: 1,
            title: "Aprobación del presupuesto".to_string(),
            description: None,
            voting_type: VotingType::SimpleMajority,
            options: Vec::new(),
            required_percentage: None,
            base_for_percentage: PercentageBase::default(),
        },
    )?;
    let budget_ballots = [YES, YES, YES, NO];
    let results = run_voting(&services, &schema, &admin, budget.id, &attendees, &budget_ballots)?;
    print_results(&results);

    let roofs = assemblies.create_voting(
        &schema,
        &admin,
        assembly.id,
        NewVoting {
            agenda_point: 2,
            title: "Cuota extraordinaria para cubiertas".to_string(),
            description: None,
            voting_type: VotingType::QualifiedMajority,
            options: Vec::new(),
            required_percentage: Some(70.0),
            base_for_percentage: PercentageBase::VotedCoefficients,
        },
    )?;
    let roof_ballots = [YES, YES, NO, ABSTAIN];
    let results = run_voting(&services, &schema, &admin, roofs.id, &attendees, &roof_ballots)?;
    print_results(&results);

    println!("\n5. Closing and minutes");
    let closure = assemblies.end_assembly(&schema, &admin, assembly.id)?;
    println!(
        "- Assembly {} | minutes {} {}",
        closure.assembly.status.label(),
        closure.minutes.id,
        closure.minutes.status.label()
    );
    let minutes = settled_minutes(assemblies, &schema, assembly.id).await?;
    println!(
        "- Minutes {} at {}",
        minutes.status.label(),
        minutes.pdf_url.as_deref().unwrap_or("-")
    );
    if let Some(log) = &minutes.generation_log {
        println!("- Generation log: {log}");
    }

    let signers = vec![
        Signer {
            user_id: DEMO_ADMIN,
            name: "Administración".to_string(),
            role: "Presidente".to_string(),
        },
        Signer {
            user_id: OWNERS[0].0,
            name: "Propietario unidad 101".to_string(),
            role: "Secretario".to_string(),
        },
    ];
    let signatures = assemblies.register_required_signers(&schema, &admin, minutes.id, signers)?;
    for signature in signatures {
        let signed = assemblies.sign_minutes(
            &schema,
            &Actor::resident(signature.signer_user_id),
            signature.id,
            SignatureContext::default(),
        )?;
        println!("- {} signed as {}", signed.signer_name, signed.signer_role);
    }

    let minutes = assemblies.minutes_for(&schema, assembly.id)?;
    println!(
        "- Minutes {} ({} / {} signatures) -> {}",
        minutes.status.label(),
        minutes.signatures_completed,
        minutes.signatures_required,
        minutes.signed_pdf_url.as_deref().unwrap_or("-")
    );

    Ok(())
}

/// Waits for the generation scheduled by `end_assembly` to leave GENERATING.
async fn settled_minutes(
    assemblies: &AssemblyService,
    schema: &SchemaName,
    assembly_id: u64,
) -> Result<AssemblyMinutes, AppError> {
    loop {
        let minutes = assemblies.minutes_for(schema, assembly_id)?;
        if minutes.status != MinutesStatus::Generating {
            return Ok(minutes);
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

fn run_voting(
    services: &Services,
    schema: &SchemaName,
    admin: &Actor,
    voting_id: u64,
    attendees: &[Attendee],
    ballots: &[&str],
) -> Result<VotingResults, AppError> {
    let assemblies = services.assemblies.as_ref();
    assemblies.start_voting(schema, admin, voting_id)?;
    for (attendee, value) in attendees.iter().zip(ballots) {
        assemblies.cast_vote(
            schema,
            &Actor::resident(attendee.user_id),
            voting_id,
            NewVote {
                attendee_id: attendee.id,
                value: (*value).to_string(),
                comments: None,
                ip_address: None,
                user_agent: None,
            },
        )?;
    }
    assemblies.close_voting(schema, admin, voting_id)?;
    Ok(assemblies.voting_results(schema, voting_id)?)
}

fn print_results(results: &VotingResults) {
    let verdict = match results.is_approved {
        Some(true) => "APROBADO",
        Some(false) => "NO APROBADO",
        None => "PENDIENTE",
    };
    println!(
        "- '{}': {} votes, {:.2}% coefficient -> {}",
        results.title, results.total_votes, results.total_coefficient_voted, verdict
    );
    for option in &results.options {
        println!(
            "    {}: {} votes | {:.2}% coefficient | {:.1}%",
            option.option, option.count, option.coefficient, option.percentage
        );
    }
}
