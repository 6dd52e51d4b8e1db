use std::time::Instant;

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::auth::{self, LearnerSummary};
use crate::captcha::{self, TesseractSolver};
use crate::checkpoint::PortalCheckpointTransport;
use crate::config::{self, CaptchaMode, StudyConfig};
use crate::course::{Course, parse_course_listing};
use crate::error::{StudyError, StudyResult};
use crate::orchestrator::BatchRunner;
use crate::portal::Portal;
use crate::probe::{FfprobeProber, PortalDurationResolver};
use crate::process_guard::{self, LockState};
use crate::selection;
use crate::simulator::SleepPacer;
use crate::ui::{self, ConsoleProgress};
use crate::util::{human_duration, now_local};

const SELECTION_PROMPT: &str = "请输入要学习的课程序号 (all / 3 / 1,4-6 / 5-2)：";

#[derive(Debug, Clone, Default)]
pub struct LearnOptions {
    pub select: Option<String>,
    pub seed: Option<u64>,
}

/// Log in, list, pick, then play the picked courses one by one.
pub fn learn(config: &StudyConfig, options: LearnOptions) -> Result<()> {
    print_banner();
    let _lock = process_guard::acquire()?;
    let started = Instant::now();

    let (portal, courses) = login_and_list(config)?;
    ui::print_course_table(&courses);

    let expression = match options.select {
        Some(expression) => expression,
        None => ui::prompt(SELECTION_PROMPT)?,
    };
    let mut picked = selection::select(&courses, &expression);
    info!(expression = %expression, picked = picked.len(), "selection parsed");
    if !picked.is_empty() {
        ui::info(&format!("# 已选择 {} 门课程", picked.len()));
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut resolver =
        PortalDurationResolver::new(&portal, FfprobeProber::new(&config.ffprobe_path));
    let mut transport = PortalCheckpointTransport::new(&portal);
    let mut pacer = SleepPacer;
    let mut progress = ConsoleProgress::new();

    let report = BatchRunner::new(&mut resolver, &mut transport, &mut pacer, &mut progress)
        .run_batch(&mut picked, &mut rng)?;

    ui::status(&format!(
        "# 全部完成：{} 门课程，{} 次进度提交，共 {} 秒，用时 {}",
        report.courses_completed,
        report.checkpoints,
        report.seconds_reported,
        human_duration(started.elapsed())
    ));
    Ok(())
}

/// Log in and print the enrolled courses without learning anything.
pub fn list_courses(config: &StudyConfig) -> Result<()> {
    print_banner();
    let (_portal, courses) = login_and_list(config)?;
    ui::print_course_table(&courses);
    Ok(())
}

fn login_and_list(config: &StudyConfig) -> StudyResult<(Portal, Vec<Course>)> {
    ui::info("# 正在加载用户信息...");
    let credentials = auth::load_credentials(&config.credentials_file())?;

    let portal = Portal::new(config);
    let mut solver = captcha::solver_for(&config.captcha);
    let summary = auth::login(&portal, &credentials, solver.as_mut())?;
    ui::info("# 登录成功");
    if let Some(summary) = summary {
        print_summary(&summary);
    }

    let courses = fetch_courses(&portal)?;
    Ok((portal, courses))
}

fn fetch_courses(portal: &Portal) -> StudyResult<Vec<Course>> {
    let html = portal
        .course_listing()
        .map_err(|err| StudyError::CourseAcquisition(format!("course listing: {err}")))?;
    let courses = parse_course_listing(&html);
    if courses.is_empty() {
        return Err(StudyError::CourseAcquisition(
            "暂无已报名课程 (no enrolled courses)".to_string(),
        ));
    }
    info!(count = courses.len(), "enrolled courses listed");
    Ok(courses)
}

fn print_summary(summary: &LearnerSummary) {
    ui::info("-----------------------------------------------");
    for line in summary.lines() {
        ui::status(&line);
    }
}

fn print_banner() {
    ui::info("# --------------------------------------------------");
    ui::info(&format!("# 程序启动，时间戳：{}", now_local()));
}

pub fn print_status(config: &StudyConfig) -> Result<()> {
    println!("hebgb-study status");
    println!("home: {}", config::study_home().display());
    println!("config: {}", config::config_path().display());
    println!("portal: {}", config.base_url);
    println!("credentials: {}", config.credentials_file().display());
    match process_guard::inspect()? {
        LockState::Free => println!("running: false"),
        LockState::Held { pid: Some(pid) } => println!("running: true (pid {pid})"),
        LockState::Held { pid: None } => println!("running: true"),
    }
    Ok(())
}

pub fn doctor(config: &StudyConfig) -> Result<u8> {
    let mut issues = 0u8;

    println!("hebgb-study doctor");
    println!("config_path: {}", config::config_path().display());
    println!("portal: {}", config.base_url);

    match auth::load_credentials(&config.credentials_file()) {
        Ok(creds) => println!("[OK] Credentials loaded for {}.", creds.username),
        Err(err) => {
            issues += 1;
            println!("[WARN] {err}");
        }
    }

    if FfprobeProber::new(&config.ffprobe_path).is_available() {
        println!("[OK] {} available.", config.ffprobe_path);
    } else {
        issues += 1;
        println!(
            "[WARN] {} not found; course durations cannot be probed.",
            config.ffprobe_path
        );
    }

    let tesseract = TesseractSolver::new(&config.captcha.tesseract_path, config.captcha.threshold);
    match (config.captcha.mode, tesseract.is_available()) {
        (CaptchaMode::Manual, _) => println!("[INFO] Captcha is entered manually."),
        (_, true) => println!("[OK] {} available.", config.captcha.tesseract_path),
        (CaptchaMode::Auto, false) => println!(
            "[INFO] {} not found; the captcha will be asked for interactively.",
            config.captcha.tesseract_path
        ),
        (CaptchaMode::Tesseract, false) => {
            issues += 1;
            println!(
                "[WARN] {} not found but captcha mode is tesseract.",
                config.captcha.tesseract_path
            );
        }
    }

    match config.request_timeout() {
        Some(timeout) => println!("[OK] Request timeout {}s.", timeout.as_secs()),
        None => println!("[INFO] Requests have no timeout and may hang indefinitely."),
    }

    if issues == 0 {
        println!("Doctor: healthy");
        Ok(0)
    } else {
        println!("Doctor: {issues} issue(s) found");
        Ok(1)
    }
}
