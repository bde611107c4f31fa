//! Command-line front end: pick a provider, run a flow, and print what came back.

// std
use std::{io::Result as IoResult, time::Duration};
// crates.io
use clap::{Args, Parser, Subcommand};
use color_eyre::{Result, eyre::WrapErr};
use tracing_subscriber::EnvFilter;
use url::Url;
// self
use oauth_tester::{
	auth::{ClientId, TenantId, TokenResponse},
	flows::{
		BrowserLauncher, DEFAULT_PORT, FlowRequest, FlowSettings, ReqwestFlowEngine, SystemBrowser,
	},
	inspect,
	provider::{ProviderCredentials, ProviderDescriptor, ProviderKind},
	report::{DecodedTokenView, DiscoveryView, TokenResponseView},
};

/// Test OAuth 2.0 flows against Microsoft, Salesforce, and similar providers.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Print full request, response, and token detail.
	#[arg(short, long, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Fetch provider metadata and probe which grants the client can use.
	Discover(ProviderArgs),
	/// Run the Authorization Code + PKCE flow through the browser.
	AuthCode(AuthCodeArgs),
	/// Request an app-only token with the Client Credentials grant.
	ClientCredentials(ProviderArgs),
	/// Decode a pasted token without contacting any provider.
	Inspect {
		/// Access or ID token.
		token: String,
	},
}

#[derive(Debug, Args)]
struct ProviderArgs {
	/// Provider family (`microsoft` or `salesforce`).
	#[arg(long)]
	provider: ProviderKind,
	/// OAuth client (application) id.
	#[arg(long, env = "OAUTH_CLIENT_ID")]
	client_id: String,
	/// OAuth client secret.
	#[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
	client_secret: Option<String>,
	/// Microsoft tenant id or domain.
	#[arg(long, env = "OAUTH_TENANT_ID")]
	tenant_id: Option<String>,
	/// Salesforce instance URL (defaults to the production login host).
	#[arg(long, env = "OAUTH_INSTANCE_URL")]
	instance_url: Option<String>,
	/// Space-delimited scopes; empty uses the provider default.
	#[arg(long, default_value = "")]
	scope: String,
	/// Per-request HTTP timeout in seconds.
	#[arg(long, default_value_t = 30)]
	http_timeout: u64,
}
impl ProviderArgs {
	fn descriptor(&self) -> Result<ProviderDescriptor> {
		let mut credentials = ProviderCredentials::default();

		if let Some(tenant) = &self.tenant_id {
			credentials = credentials.with_tenant_id(TenantId::new(tenant)?);
		}
		if let Some(instance) = &self.instance_url {
			credentials = credentials.with_instance_url(instance);
		}

		Ok(self.provider.resolve(&credentials)?)
	}

	fn request(&self, verbose: bool) -> Result<FlowRequest> {
		let mut request = FlowRequest::new(ClientId::new(&self.client_id)?)
			.with_scope(&self.scope)
			.verbose(verbose);

		if let Some(secret) = &self.client_secret {
			request = request.with_client_secret(secret);
		}

		Ok(request)
	}

	fn settings(&self) -> FlowSettings {
		FlowSettings { http_timeout: Duration::from_secs(self.http_timeout), ..Default::default() }
	}
}

#[derive(Debug, Args)]
struct AuthCodeArgs {
	#[command(flatten)]
	provider: ProviderArgs,
	/// Redirect URI registered with the provider.
	#[arg(long)]
	redirect_uri: Option<Url>,
	/// Local port for the redirect listener.
	#[arg(long, default_value_t = DEFAULT_PORT)]
	port: u16,
	/// Seconds to wait for the redirect.
	#[arg(long, default_value_t = 300)]
	timeout: u64,
	/// Print the authorization URL without opening a browser.
	#[arg(long)]
	no_browser: bool,
}

/// Prints the authorization URL and, unless disabled, opens it.
struct ConsoleLauncher {
	open_browser: bool,
}
impl BrowserLauncher for ConsoleLauncher {
	fn launch(&self, url: &Url) -> IoResult<()> {
		println!();
		println!("Open this URL to sign in:");
		println!("{url}");
		println!();

		if self.open_browser { SystemBrowser.launch(url) } else { Ok(()) }
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();

	init_tracing(cli.verbose);

	match &cli.command {
		Command::Discover(args) => discover(args, cli.verbose).await,
		Command::AuthCode(args) => auth_code(args, cli.verbose).await,
		Command::ClientCredentials(args) => client_credentials(args, cli.verbose).await,
		Command::Inspect { token } => {
			let decoded = inspect::decode(token);
			let title = if decoded.is_jwt() { "Token (JWT)" } else { "Token Analysis (Opaque)" };

			print!("{}", DecodedTokenView::new(title, &decoded, cli.verbose));

			Ok(())
		},
	}
}

fn init_tracing(verbose: bool) {
	let fallback = if verbose { "oauth_tester=debug" } else { "oauth_tester=info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn banner(title: &str, descriptor: &ProviderDescriptor) {
	println!("OAuth 2.0 {title} - {}", descriptor.display_name());
	println!("Authorization endpoint: {}", descriptor.endpoints.authorization);
	println!("Token endpoint: {}", descriptor.endpoints.token);
}

fn print_tokens(response: &TokenResponse, verbose: bool) {
	let report = inspect::inspect(response);

	print!("{}", TokenResponseView::new(response, &report, verbose));
}

async fn discover(args: &ProviderArgs, verbose: bool) -> Result<()> {
	let descriptor = args.descriptor()?;

	banner("Discovery", &descriptor);

	let engine = ReqwestFlowEngine::new(descriptor, args.settings())?;
	let report = engine
		.discover(&args.request(verbose)?)
		.await
		.wrap_err("Discovery could not run.")?;

	print!("{}", DiscoveryView::new(&report, verbose));

	Ok(())
}

async fn auth_code(args: &AuthCodeArgs, verbose: bool) -> Result<()> {
	let descriptor = args.provider.descriptor()?;

	banner("Authorization Code + PKCE", &descriptor);

	let settings = FlowSettings {
		listener_timeout: Duration::from_secs(args.timeout),
		..args.provider.settings()
	};
	let engine = ReqwestFlowEngine::new(descriptor, settings)?;
	let mut request = args.provider.request(verbose)?.with_port(args.port);

	if let Some(redirect_uri) = &args.redirect_uri {
		request = request.with_redirect_uri(redirect_uri.clone());
	}

	let launcher = ConsoleLauncher { open_browser: !args.no_browser };
	let response = engine
		.authorization_code(&request, &launcher)
		.await
		.wrap_err("Authorization Code flow failed.")?;

	print_tokens(&response, verbose);

	Ok(())
}

async fn client_credentials(args: &ProviderArgs, verbose: bool) -> Result<()> {
	let descriptor = args.descriptor()?;

	banner("Client Credentials", &descriptor);

	let engine = ReqwestFlowEngine::new(descriptor, args.settings())?;
	let response = engine
		.client_credentials(&args.request(verbose)?)
		.await
		.wrap_err("Client Credentials flow failed.")?;

	print_tokens(&response, verbose);

	Ok(())
}
