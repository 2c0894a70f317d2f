mod boot;
mod config;
mod logcmd;

use owo_colors::OwoColorize;

use config::Config;

fn main() {
	tracing_subscriber::fmt().init();

	let args: Vec<String> = std::env::args().skip(1).collect();

	if args.is_empty() {
		print_usage();
		return;
	}

	match args[0].as_str() {
		"help" | "--help" | "-h" => print_usage(),
		"version" | "--version" | "-V" => println!("seboot {}", env!("CARGO_PKG_VERSION")),
		"boot" | "--boot" | "-b" => {
			let cfg = load_and_check();
			boot::run_boot(&cfg);
		}
		"log" => {
			let cfg = load_and_check();
			std::process::exit(logcmd::run(&cfg, &args[1..]));
		}
		_ => {
			// Anything else is a command to daemonize and supervise.
			let cfg = load_and_check();
			if seproc::spawn_daemon(&cfg.store(), &args).is_err() {
				std::process::exit(1);
			}
		}
	}
}

/// Load the config, make sure the state dir exists and any existing log
/// files are readable. Failures here are fatal before anything detaches.
fn load_and_check() -> Config {
	let cfg = Config::load();

	if let Err(e) = std::fs::create_dir_all(&cfg.state_dir) {
		eprintln!("seboot: create {}: {}", cfg.state_dir.display(), e);
		std::process::exit(1);
	}

	for path in [cfg.log_path(), cfg.backup_path()] {
		if path.exists() {
			if let Err(e) = std::fs::File::open(&path) {
				eprintln!("seboot: {}: {}", path.display(), e);
				std::process::exit(1);
			}
		}
	}

	cfg
}

fn print_usage() {
	eprintln!("{} {} — run commands as daemons, sequence boot scripts", "seboot".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} <command> | boot | log [flags] | help", "seboot".bold());
	eprintln!();

	eprintln!("{}", "commands".cyan().bold());
	eprintln!("  {}              daemonize and supervise a command", "<command>".bold());
	eprintln!("  {}                   run the ordered boot scripts", "boot".bold());
	eprintln!("  {}                    query the log", "log".bold());
	eprintln!("  {}                   show this help", "help".bold());
	eprintln!();

	eprintln!("{}", "log flags".cyan().bold());
	eprintln!("  -s, --start-time MS         start timestamp (milliseconds)");
	eprintln!("  -e, --end-time MS           end timestamp (milliseconds)");
	eprintln!("  -t, --type T1[,T2...]       include log types");
	eprintln!("  -x, --exclude-type T1[,..]  exclude log types");
	eprintln!("  -p, --pid P1[,P2...]        include process IDs");
	eprintln!("  -X, --exclude-pid P1[,..]   exclude process IDs");
	eprintln!("  -P, --path PATH1[,..]       include paths");
	eprintln!("  -E, --exclude-path P1[,..]  exclude paths");
	eprintln!("  -n, --name N1[,N2...]       include names");
	eprintln!("  -N, --exclude-name N1[,..]  exclude names");
	eprintln!("  -c, --count NUM             maximum number of entries");
	eprintln!("  -H, --human-time            human-readable time");
	eprintln!("      --human-type            type names instead of codes");
	eprintln!("      --no-timestamp          hide the timestamp field");
	eprintln!("      --no-type               hide the type field");
	eprintln!("      --no-pid                hide the pid field");
	eprintln!("      --no-path               hide the path field");
	eprintln!("      --no-name               hide the name field");
	eprintln!("  -o, --output FILE           write to a file (default: stdout)");
	eprintln!();

	eprintln!("{}", "boot units".cyan().bold());
	eprintln!("  scripts named {} run in ascending DD order,", "DD_TT_<suffix>".bold());
	eprintln!("  each given TT seconds before the next one starts;");
	eprintln!("  overrunning scripts keep running and are reaped later");
}
