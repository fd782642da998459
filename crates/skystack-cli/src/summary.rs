use console::Style;
use skystack_core::frame::Channel;
use skystack_core::pipeline::config::StackJobConfig;
use skystack_core::pipeline::JobReport;
use skystack_core::stack::SigmaClipParams;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            error: Style::new().red().bold(),
        }
    }
}

pub fn print_job_header(config: &StackJobConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Skystack"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(8)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(config.frames.len())
    );
    if let Some(reference) = config.frames.get(config.reference) {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Reference"),
            s.path.apply_to(reference.display())
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Unaligned"),
        if config.include_unaligned {
            s.method.apply_to("included at (0, 0)")
        } else {
            s.disabled.apply_to("skipped")
        }
    );
    println!();

    print_sigma_section(&s, &config.sigma_clip);

    println!("  {}", s.header.apply_to("Output"));
    match &config.output.float {
        Some(path) => println!(
            "    {:<12}{}",
            s.label.apply_to("Float"),
            s.path.apply_to(path.display())
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Float"),
            s.disabled.apply_to("disabled")
        ),
    }
    match &config.output.integer {
        Some(path) => println!(
            "    {:<12}{} {}",
            s.label.apply_to("16-bit"),
            s.path.apply_to(path.display()),
            s.label.apply_to(if config.output.dither {
                "(dithered)"
            } else {
                "(rounded)"
            })
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("16-bit"),
            s.disabled.apply_to("disabled")
        ),
    }
    println!();
}

fn print_sigma_section(s: &Styles, params: &SigmaClipParams) {
    println!("  {}", s.header.apply_to("Sigma Clip"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(params.iterations)
    );
    for channel in Channel::ALL {
        let label = format!("Sigma {channel}");
        match params.threshold(channel) {
            Some(t) => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.value.apply_to(format!("{t:.1}"))
            ),
            None => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.disabled.apply_to("off")
            ),
        }
    }
    if params.sky_level {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Sky level"),
            s.method.apply_to(params.sky_adjustment)
        );
    }
    if params.comet_mode {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Comet"),
            s.method.apply_to("reference kept on final pass")
        );
    }
    println!();
}

pub fn print_job_report(report: &JobReport) {
    let s = Styles::new();
    let summary = &report.summary;

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Stacked"),
        s.value.apply_to(format!("{} frames", summary.frames_stacked))
    );
    if summary.frames_skipped > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Skipped"),
            s.disabled.apply_to(summary.frames_skipped)
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Passes"),
        s.value.apply_to(format!(
            "{}/{}{}",
            summary.passes_run,
            summary.passes_requested,
            if summary.stopped_early { " (stopped)" } else { "" }
        ))
    );
    if let Some(median) = summary.median_contributions {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Median n"),
            s.value.apply_to(format!("{median:.1}"))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Rejected"),
            s.value.apply_to(format!(
                "R {}  G {}  B {}",
                summary.rejected[0], summary.rejected[1], summary.rejected[2]
            ))
        );
    }
    if summary.empty_cells > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Empty"),
            s.disabled.apply_to(format!("{} cells (NaN)", summary.empty_cells))
        );
    }
    println!();

    for path in &report.written {
        println!("  Saved to {}", s.path.apply_to(path.display()));
    }
    for (path, reason) in &report.failed_outputs {
        println!(
            "  {} {}: {}",
            s.error.apply_to("Failed"),
            path.display(),
            reason
        );
    }
}
