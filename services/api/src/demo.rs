use crate::infra::MemoryLernService;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use lern::artifacts::MemoryBlobStore;
use lern::config::AppContext;
use lern::domain::{
    Competency, CompetencyId, CompetencyType, OrgType, Organization, RaterType, Rating, RatingId,
    RatingScore, Role, RubricScale, User, UserId,
};
use lern::error::AppError;
use lern::import::RatingCsvImporter;
use lern::onboarding::{OnboardingWizard, RatingDraft};
use lern::portfolio::PublicPortfolio;
use lern::ratings::{MentorRating, RatingRequest};
use lern::search::{HiddenPolicy, LearnerMatch, SearchCriterion, SearchOptions};
use lern::store::{Document, LernRepository, MemoryStore, RatingFilter, WriteBatch};
use lern::suggestions::{StaticSuggester, SuggestedRating};
use lern::{LernService, ServiceError};

pub(crate) const DEMO_LEARNER_ID: &str = "learner-demo";
pub(crate) const DEMO_MASTER_ID: &str = "master-1";

#[derive(Args, Debug)]
pub(crate) struct PortfolioArgs {
    /// Learner whose public portfolio should be printed
    #[arg(long, default_value = DEMO_LEARNER_ID)]
    pub(crate) learner: String,
    /// Ratings CSV export replacing the demo ratings
    #[arg(long)]
    pub(crate) ratings_csv: Option<PathBuf>,
    /// Print the portfolio as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SearchArgs {
    /// Threshold as COMPETENCY:MIN, e.g. comp-python:3. Repeat for more criteria.
    #[arg(long = "criterion", value_parser = crate::infra::parse_criterion, required = true)]
    pub(crate) criteria: Vec<SearchCriterion>,
    /// Count competencies the learner hid from their profile
    #[arg(long)]
    pub(crate) ignore_hidden: bool,
    /// Ratings CSV export replacing the demo ratings
    #[arg(long)]
    pub(crate) ratings_csv: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Ratings CSV export replacing the demo ratings
    #[arg(long)]
    pub(crate) ratings_csv: Option<PathBuf>,
    /// Skip the onboarding portion of the demo
    #[arg(long)]
    pub(crate) skip_onboarding: bool,
}

pub(crate) fn run_portfolio_report(args: PortfolioArgs) -> Result<(), AppError> {
    let PortfolioArgs {
        learner,
        ratings_csv,
        json,
    } = args;

    let service = demo_service(load_ratings(ratings_csv)?)?;
    let portfolio = service.public_portfolio(&UserId::from(learner))?;

    if json {
        match serde_json::to_string_pretty(&portfolio) {
            Ok(json) => println!("{}", json),
            Err(err) => println!("Portfolio payload unavailable: {}", err),
        }
    } else {
        print!("{}", render_portfolio(&portfolio));
    }
    Ok(())
}

pub(crate) fn run_search_report(args: SearchArgs) -> Result<(), AppError> {
    let SearchArgs {
        criteria,
        ignore_hidden,
        ratings_csv,
    } = args;

    let service = demo_service(load_ratings(ratings_csv)?)?;
    let options = SearchOptions {
        hidden_policy: if ignore_hidden {
            HiddenPolicy::IgnoreHidden
        } else {
            HiddenPolicy::ExcludeHidden
        },
    };
    let matches = service.search_with(&criteria, &options)?;
    print!("{}", render_matches(&criteria, &matches));
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        ratings_csv,
        skip_onboarding,
    } = args;

    println!("LERN competency demo");
    let service = demo_service(load_ratings(ratings_csv)?)?;
    let learner_id = UserId::from(DEMO_LEARNER_ID);
    let master_id = UserId::from(DEMO_MASTER_ID);

    let mut learner_feed = service.watch_ratings(RatingFilter::learner(learner_id.clone()))?;

    println!("\nMentor rating with self and master requests");
    let saved = service.add_mentor_rating(MentorRating {
        learner_id: learner_id.clone(),
        competency_id: CompetencyId::from("comp-critical-thinking"),
        score: score(3)?,
        comment: Some("Led the debate prep and weighed counterarguments".to_string()),
        request_self: true,
        master_id: Some(master_id.clone()),
    })?;
    for rating in &saved {
        println!(
            "- {} {} by {} ({})",
            rating.id,
            rating.state.label(),
            rating.rater_id,
            rating.rater_type.label()
        );
    }

    let extra = service.request_ratings(RatingRequest {
        learner_id: learner_id.clone(),
        competency_id: CompetencyId::from("comp-data-analysis"),
        request_self: false,
        master_id: Some(master_id.clone()),
    })?;
    println!("- requested {} more master rating(s)", extra.len());

    println!("\nMaster rating queue");
    let mut flow = service.start_rating_flow(&master_id, Some(RaterType::Master))?;
    println!("- {} pending rating(s)", flow.len());
    if !flow.is_empty() {
        let rating = service.submit_in_flow(
            &mut flow,
            score(4)?,
            Some("Would hire for an analyst internship".to_string()),
        )?;
        println!(
            "- rated {} ({}/{} | {:.0}% done)",
            rating.competency_id,
            flow.position(),
            flow.len(),
            flow.progress()
        );
    }
    while flow.skip() {
        println!("- skipped to {}/{}", flow.position(), flow.len());
    }
    println!("- flow finished: {}", flow.finished());

    println!("\nRating events for {}", learner_id);
    while let Some(event) = learner_feed.try_recv() {
        println!(
            "- {:?} {} ({}, {})",
            event.change,
            event.rating.id,
            event.rating.competency_id,
            event.rating.state.label()
        );
    }
    drop(learner_feed);

    print!("\n{}", render_portfolio(&service.public_portfolio(&learner_id)?));

    if !skip_onboarding {
        println!("\nOnboarding from a transcript");
        let transcript = "Built a Flask dashboard for the robotics club and ran weekly stand-ups.";
        let suggestions = service.analyze_transcript(transcript).await?;
        println!("- {} suggestion(s) from the transcript", suggestions.len());

        let mut wizard = OnboardingWizard::new();
        wizard
            .set_info("Riley Park", "riley.park@demo.edu")
            .map_err(ServiceError::from)?;
        wizard
            .attach_suggestions(suggestions)
            .map_err(ServiceError::from)?;
        wizard.add_rating().map_err(ServiceError::from)?;
        wizard
            .update_rating(
                0,
                RatingDraft {
                    competency_id: Some(CompetencyId::from("comp-critical-thinking")),
                    score: score(2)?,
                    comment: "Asks sharp questions in seminar".to_string(),
                },
            )
            .map_err(ServiceError::from)?;

        let batch = service.complete_onboarding(&mut wizard)?;
        println!(
            "- created {} with {} rating(s)",
            batch.learner.id,
            batch.ratings.len()
        );
        print!(
            "\n{}",
            render_portfolio(&service.public_portfolio(&batch.learner.id)?)
        );
    }

    let criteria = vec![
        SearchCriterion {
            competency_id: CompetencyId::from("comp-python"),
            min_rating: 3.0,
        },
        SearchCriterion {
            competency_id: CompetencyId::from("comp-collaboration"),
            min_rating: 2.0,
        },
    ];
    let matches = service.search(&criteria)?;
    print!("\n{}", render_matches(&criteria, &matches));

    Ok(())
}

fn load_ratings(path: Option<PathBuf>) -> Result<Option<Vec<Rating>>, AppError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let ratings = RatingCsvImporter::from_path(path)?;
    Ok(Some(ratings))
}

/// In-memory service holding the demo dataset, optionally with imported ratings.
pub(crate) fn demo_service(
    ratings_override: Option<Vec<Rating>>,
) -> Result<MemoryLernService, ServiceError> {
    let context = AppContext::default();
    let store = MemoryStore::new();
    seed_demo_dataset(&store, &context, ratings_override)?;

    Ok(LernService::new(
        Arc::new(store),
        Arc::new(MemoryBlobStore::default()),
        Arc::new(StaticSuggester::new(demo_suggestions()?)),
        context,
    ))
}

/// Load the demo organization into `store` in a single batch. Imported ratings
/// replace the built-in ones when given.
pub(crate) fn seed_demo_dataset(
    store: &MemoryStore,
    context: &AppContext,
    ratings_override: Option<Vec<Rating>>,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let mut batch = WriteBatch::new().set(Document::Organization(Organization {
        id: context.org_id.clone(),
        name: "Demo High School".to_string(),
        org_type: OrgType::Education,
        created_at: now,
    }));

    for user in demo_users(context, now) {
        batch = batch.set(Document::User(user));
    }
    for competency in demo_competencies(context, now) {
        batch = batch.set(Document::Competency(competency));
    }

    let ratings = match ratings_override {
        Some(ratings) => ratings,
        None => demo_ratings(context, now)?,
    };
    let rating_count = ratings.len();
    for rating in ratings {
        batch = batch.set(Document::Rating(rating));
    }

    store.commit_batch(batch)?;
    tracing::info!(org_id = %context.org_id, ratings = rating_count, "demo dataset loaded");
    Ok(())
}

fn demo_users(context: &AppContext, now: DateTime<Utc>) -> Vec<User> {
    let user = |id: &str, name: &str, email: &str, role: Role| User {
        id: UserId::from(id),
        display_name: name.to_string(),
        email: email.to_string(),
        org_id: context.org_id.clone(),
        roles: BTreeSet::from([role]),
        hidden_competency_ids: None,
        competency_display_order: None,
        created_at: now,
    };

    let mut maya = user("learner-maya", "Maya Chen", "maya.chen@demo.edu", Role::Learner);
    maya.hidden_competency_ids = Some(vec![CompetencyId::from("comp-web-dev")]);
    maya.competency_display_order = Some(vec![
        CompetencyId::from("comp-collaboration"),
        CompetencyId::from("comp-python"),
    ]);

    vec![
        user(
            context.educator_id.as_str(),
            "Jane Educator",
            "educator@demo.edu",
            Role::Educator,
        ),
        user(DEMO_MASTER_ID, "Test Employer", "test@employer.demo", Role::Master),
        user(
            DEMO_LEARNER_ID,
            "Demo Student",
            "demo.student@demo.edu",
            Role::Learner,
        ),
        maya,
        user(
            "learner-jordan",
            "Jordan Reyes",
            "jordan.reyes@demo.edu",
            Role::Learner,
        ),
    ]
}

fn demo_competencies(context: &AppContext, now: DateTime<Utc>) -> Vec<Competency> {
    [
        (
            "comp-python",
            "Python Programming",
            "Ability to write Python code for data analysis and automation",
            CompetencyType::Hard,
        ),
        (
            "comp-critical-thinking",
            "Critical Thinking",
            "Analyze complex problems and develop reasoned solutions",
            CompetencyType::Soft,
        ),
        (
            "comp-web-dev",
            "Web Development (HTML/CSS/JS)",
            "Build responsive web applications using modern frameworks",
            CompetencyType::Hard,
        ),
        (
            "comp-collaboration",
            "Collaboration",
            "Work effectively in teams and communicate clearly",
            CompetencyType::Soft,
        ),
        (
            "comp-data-analysis",
            "Data Analysis",
            "Interpret data, create visualizations, and draw insights",
            CompetencyType::Hard,
        ),
    ]
    .into_iter()
    .map(|(id, title, description, kind)| Competency {
        id: CompetencyId::from(id),
        org_id: context.org_id.clone(),
        created_by: context.educator_id.clone(),
        title: title.to_string(),
        description: description.to_string(),
        kind,
        rubric: RubricScale::default(),
        created_at: now,
    })
    .collect()
}

fn demo_ratings(context: &AppContext, now: DateTime<Utc>) -> Result<Vec<Rating>, ServiceError> {
    let educator = context.educator_id.as_str();
    let rows: [(&str, &str, &str, &str, RaterType, u8, &str, i64); 12] = [
        ("rating-python-self-0", DEMO_LEARNER_ID, "comp-python", DEMO_LEARNER_ID, RaterType::SelfAssessment, 1, "Complete beginner, just installed Python", 90),
        ("rating-python-self-1", DEMO_LEARNER_ID, "comp-python", DEMO_LEARNER_ID, RaterType::SelfAssessment, 2, "Just starting to learn Python basics", 60),
        ("rating-python-mentor-1", DEMO_LEARNER_ID, "comp-python", educator, RaterType::Mentor, 2, "Shows promise, needs consistent practice", 55),
        ("rating-python-self-2", DEMO_LEARNER_ID, "comp-python", DEMO_LEARNER_ID, RaterType::SelfAssessment, 3, "Completed several Python projects including a data scraper", 30),
        ("rating-collab-mentor-1", DEMO_LEARNER_ID, "comp-collaboration", educator, RaterType::Mentor, 3, "Keeps group projects on schedule", 40),
        ("rating-web-self-1", DEMO_LEARNER_ID, "comp-web-dev", DEMO_LEARNER_ID, RaterType::SelfAssessment, 2, "Built a personal site with plain HTML and CSS", 20),
        ("rating-maya-python-mentor", "learner-maya", "comp-python", educator, RaterType::Mentor, 4, "Wrote the class grading tool", 35),
        ("rating-maya-python-master", "learner-maya", "comp-python", DEMO_MASTER_ID, RaterType::Master, 3, "Solid fundamentals for an intern", 10),
        ("rating-maya-web-mentor", "learner-maya", "comp-web-dev", educator, RaterType::Mentor, 4, "Shipped the club website", 25),
        ("rating-maya-collab-mentor", "learner-maya", "comp-collaboration", educator, RaterType::Mentor, 2, "Prefers working alone", 15),
        ("rating-jordan-python-mentor", "learner-jordan", "comp-python", educator, RaterType::Mentor, 3, "Reliable on scripting tasks", 28),
        ("rating-jordan-collab-mentor", "learner-jordan", "comp-collaboration", educator, RaterType::Mentor, 4, "Natural team lead", 12),
    ];

    rows.into_iter()
        .map(
            |(id, learner, competency, rater, rater_type, value, comment, days_ago)| {
                Ok(Rating::completed(
                    RatingId::from(id),
                    UserId::from(learner),
                    CompetencyId::from(competency),
                    UserId::from(rater),
                    rater_type,
                    score(value)?,
                    Some(comment.to_string()),
                    now - Duration::days(days_ago),
                ))
            },
        )
        .collect()
}

fn demo_suggestions() -> Result<Vec<SuggestedRating>, ServiceError> {
    [
        ("comp-python", 3, "Built a Flask dashboard end to end"),
        ("comp-collaboration", 3, "Runs weekly stand-ups for the robotics club"),
    ]
    .into_iter()
    .map(|(competency_id, value, comment)| {
        Ok(SuggestedRating {
            competency_id: CompetencyId::from(competency_id),
            score: score(value)?,
            comment: comment.to_string(),
        })
    })
    .collect()
}

fn score(value: u8) -> Result<RatingScore, ServiceError> {
    RatingScore::new(value).map_err(|err| ServiceError::Validation(err.to_string()))
}

pub(crate) fn render_portfolio(portfolio: &PublicPortfolio) -> String {
    let mut out = String::new();
    let summary = &portfolio.learner;
    let heading = match &summary.organization {
        Some(organization) => format!("Portfolio: {} ({})\n", summary.display_name, organization),
        None => format!("Portfolio: {}\n", summary.display_name),
    };
    out.push_str(&heading);

    if portfolio.competencies.is_empty() {
        out.push_str("No rated competencies yet\n");
        return out;
    }

    for entry in &portfolio.competencies {
        let raters: Vec<&str> = entry.rater_types.iter().map(|kind| kind.label()).collect();
        out.push_str(&format!(
            "- {} [{}]: {:.2} avg over {} rating(s) | raters: {}\n",
            entry.title,
            entry.competency_id,
            entry.average,
            entry.rating_count,
            raters.join(", ")
        ));
        if !entry.artifacts.is_empty() {
            out.push_str(&format!("  evidence: {} file(s)\n", entry.artifacts.len()));
        }
    }
    out
}

pub(crate) fn render_matches(criteria: &[SearchCriterion], matches: &[LearnerMatch]) -> String {
    let mut out = String::new();
    let wanted: Vec<String> = criteria
        .iter()
        .map(|criterion| format!("{} >= {}", criterion.competency_id, criterion.min_rating))
        .collect();
    out.push_str(&format!("Search: {}\n", wanted.join(" AND ")));

    if matches.is_empty() {
        out.push_str("No learners meet every threshold\n");
        return out;
    }

    for found in matches {
        let scores: Vec<String> = found
            .matched_competencies
            .iter()
            .map(|matched| format!("{} {:.2}", matched.competency.title, matched.average))
            .collect();
        out.push_str(&format!(
            "- {} ({}): {}\n",
            found.learner.display_name,
            found.learner.id,
            scores.join(" | ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn criterion(id: &str, min_rating: f64) -> SearchCriterion {
        SearchCriterion {
            competency_id: CompetencyId::from(id),
            min_rating,
        }
    }

    #[test]
    fn demo_dataset_includes_every_role() {
        let service = demo_service(None).expect("demo data seeds");
        let store = service.store();

        let learners = store
            .learners(&service.context().org_id)
            .expect("learners load");
        assert_eq!(learners.len(), 3);

        let master = store
            .user(&UserId::from(DEMO_MASTER_ID))
            .expect("lookup")
            .expect("master seeded");
        assert!(master.has_role(Role::Master));
        assert_eq!(service.competencies().expect("catalog").len(), 5);
    }

    #[test]
    fn demo_portfolio_renders_averages() {
        let service = demo_service(None).expect("demo data seeds");
        let portfolio = service
            .public_portfolio(&UserId::from(DEMO_LEARNER_ID))
            .expect("portfolio builds");

        let text = render_portfolio(&portfolio);
        assert!(text.starts_with("Portfolio: Demo Student (Demo High School)"));
        assert!(text.contains("Python Programming [comp-python]: 2.00 avg over 4 rating(s)"));
    }

    #[test]
    fn hidden_competencies_gate_search_by_default() {
        let service = demo_service(None).expect("demo data seeds");
        let criteria = vec![criterion("comp-web-dev", 3.0)];

        let excluded = service.search(&criteria).expect("search runs");
        assert!(excluded.is_empty());

        let ignored = service
            .search_with(
                &criteria,
                &SearchOptions {
                    hidden_policy: HiddenPolicy::IgnoreHidden,
                },
            )
            .expect("search runs");
        assert_eq!(ignored.len(), 1);
        assert!(render_matches(&criteria, &ignored).contains("Maya Chen (learner-maya)"));
    }

    #[test]
    fn imported_ratings_replace_demo_ratings() {
        let file = tempfile_path("lern-demo-import.csv");
        let csv = "rating_id,learner_id,competency_id,rater_id,rater_type,status,score,comment,created_at\n\
rating-imported-1,learner-jordan,comp-data-analysis,educator-1,mentor,completed,4,,2025-01-10\n";
        std::fs::File::create(&file)
            .and_then(|mut handle| handle.write_all(csv.as_bytes()))
            .expect("fixture written");

        let ratings = load_ratings(Some(file.clone()))
            .expect("import succeeds")
            .expect("ratings present");
        let service = demo_service(Some(ratings)).expect("demo data seeds");
        let matches = service
            .search(&[criterion("comp-data-analysis", 4.0)])
            .expect("search runs");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].learner.id.as_str(), "learner-jordan");
        assert!(service
            .search(&[criterion("comp-python", 1.0)])
            .expect("search runs")
            .is_empty());

        let _ = std::fs::remove_file(file);
    }

    #[test]
    fn demo_scores_outside_the_scale_are_rejected() {
        assert_eq!(score(4).expect("top of scale").value(), 4);
        let error = score(5).expect_err("above the scale");
        assert!(matches!(error, ServiceError::Validation(message) if message.contains("5")));
    }

    #[test]
    fn empty_portfolio_and_search_render_placeholders() {
        let service = demo_service(None).expect("demo data seeds");
        let mut portfolio = service
            .public_portfolio(&UserId::from(DEMO_LEARNER_ID))
            .expect("portfolio builds");
        portfolio.competencies.clear();
        portfolio.learner.organization = None;

        assert_eq!(
            render_portfolio(&portfolio),
            "Portfolio: Demo Student\nNo rated competencies yet\n"
        );
        assert_eq!(
            render_matches(&[criterion("comp-python", 4.0)], &[]),
            "Search: comp-python >= 4\nNo learners meet every threshold\n"
        );
    }

    #[tokio::test]
    async fn demo_walkthrough_completes() {
        run_demo(DemoArgs::default()).await.expect("demo runs");
    }

    fn tempfile_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}", std::process::id(), name))
    }
}
