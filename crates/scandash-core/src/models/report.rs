//! Printable security report built from the consolidated scan payload.
//!
//! The remote `consolidated-url-info` endpoint returns every analysis for a
//! URL in one nested document whose fields may be missing, numeric where
//! text is expected, or scalar where a list is expected. Parsing here is
//! lenient: anything absent renders as `-`. The report is rendered to text
//! lines and split into fixed-height pages carrying a `Page X of N` footer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Placeholder for absent values
const EMPTY: &str = "-";

/// Width of the label column in key/value rows
const LABEL_WIDTH: usize = 26;

/// Default page height used for text output
pub const DEFAULT_LINES_PER_PAGE: usize = 60;

/// Longer lines are wrapped so every rendered line is one printed line
pub const REPORT_WIDTH: usize = 100;

const REPORT_TITLE: &str = "Consolidated Security Report";
const GENERATED_BY: &str = "Generated by scandash";

// ============================================================================
// Lenient field decoding
// ============================================================================

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(value_text))
}

fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().filter_map(value_text).collect(),
        Some(scalar) => value_text(scalar).into_iter().collect(),
    })
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Some(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    })
}

fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn object<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// ============================================================================
// Consolidated payload
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsolidatedInfo {
    #[serde(default)]
    pub data: ConsolidatedData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsolidatedData {
    #[serde(default)]
    pub url_info: Option<UrlInfo>,
    #[serde(default)]
    pub summary_recommendations: Option<SummaryRecommendations>,
    #[serde(default)]
    pub ssl_scan: Option<SslScan>,
    #[serde(default)]
    pub dns_scan: Option<DnsScan>,
    #[serde(default)]
    pub http_scan: Option<HttpScan>,
    #[serde(default)]
    pub vuln_scan: Option<VulnScan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlInfo {
    #[serde(default, deserialize_with = "text")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryRecommendations {
    #[serde(rename = "Resumen", default, deserialize_with = "text")]
    pub summary: Option<String>,
    #[serde(rename = "Puntuacion", default, deserialize_with = "number")]
    pub score: Option<f64>,
    #[serde(rename = "Clasificacion", default, deserialize_with = "text")]
    pub classification: Option<String>,
    #[serde(rename = "Recomendaciones", default, deserialize_with = "text_list")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SslScan {
    #[serde(rename = "protocolo", default, deserialize_with = "text")]
    pub protocol: Option<String>,
    #[serde(rename = "cifrado", default, deserialize_with = "text")]
    pub cipher: Option<String>,
    #[serde(rename = "tamano_clave", default, deserialize_with = "text")]
    pub key_size: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub key_exchange_group: Option<String>,
    #[serde(rename = "algoritmo_clave", default, deserialize_with = "text")]
    pub key_algorithm: Option<String>,
    #[serde(rename = "validez_desde", default, deserialize_with = "text")]
    pub valid_from: Option<String>,
    #[serde(rename = "validez_hasta", default, deserialize_with = "text")]
    pub valid_until: Option<String>,
    #[serde(rename = "validez_estado", default, deserialize_with = "text")]
    pub validity_status: Option<String>,
    #[serde(rename = "emisor", default, deserialize_with = "text")]
    pub issuer: Option<String>,
    #[serde(rename = "revocacion", default, deserialize_with = "text")]
    pub revocation: Option<String>,
    #[serde(rename = "autofirmado", default, deserialize_with = "flag")]
    pub self_signed: Option<bool>,
    #[serde(rename = "calificacion_seguridad", default, deserialize_with = "text")]
    pub security_rating: Option<String>,
    #[serde(rename = "clasificacion", default, deserialize_with = "text")]
    pub grade: Option<String>,
    #[serde(rename = "recomendaciones", default, deserialize_with = "text")]
    pub recommendations: Option<String>,
    #[serde(rename = "puertos_abiertos", default, deserialize_with = "list")]
    pub open_ports: Vec<OpenPort>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DnsScan {
    #[serde(rename = "registros_a", default, deserialize_with = "text_list")]
    pub a: Vec<String>,
    #[serde(rename = "registros_aaaa", default, deserialize_with = "text_list")]
    pub aaaa: Vec<String>,
    #[serde(rename = "registros_cname", default, deserialize_with = "text_list")]
    pub cname: Vec<String>,
    #[serde(rename = "registros_mx", default, deserialize_with = "text_list")]
    pub mx: Vec<String>,
    #[serde(rename = "registros_ns", default, deserialize_with = "text_list")]
    pub ns: Vec<String>,
    #[serde(rename = "registros_txt", default, deserialize_with = "text_list")]
    pub txt: Vec<String>,
    #[serde(rename = "proveedor_dns", default, deserialize_with = "text")]
    pub provider: Option<String>,
    #[serde(rename = "dnssec_habilitado", default, deserialize_with = "flag")]
    pub dnssec_enabled: Option<bool>,
    #[serde(rename = "dnssec_detalles", default, deserialize_with = "text")]
    pub dnssec_details: Option<String>,
    #[serde(rename = "whois_nombre_dominio", default, deserialize_with = "text")]
    pub whois_domain: Option<String>,
    #[serde(rename = "whois_registrador", default, deserialize_with = "text")]
    pub whois_registrar: Option<String>,
    #[serde(rename = "whois_fecha_creacion", default, deserialize_with = "text")]
    pub whois_created: Option<String>,
    #[serde(rename = "whois_fecha_expiracion", default, deserialize_with = "text")]
    pub whois_expires: Option<String>,
    #[serde(rename = "whois_servidores_nombres", default, deserialize_with = "text_list")]
    pub whois_name_servers: Vec<String>,
    #[serde(rename = "whois_correos_electronicos", default, deserialize_with = "text_list")]
    pub whois_emails: Vec<String>,
    #[serde(rename = "whois_organizacion", default, deserialize_with = "text")]
    pub whois_organization: Option<String>,
    #[serde(rename = "whois_pais", default, deserialize_with = "text")]
    pub whois_country: Option<String>,
    #[serde(rename = "whois_error", default, deserialize_with = "text")]
    pub whois_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpScan {
    #[serde(default, deserialize_with = "text")]
    pub security_grade: Option<String>,
    #[serde(default, deserialize_with = "object")]
    pub http_security: Map<String, Value>,
    #[serde(default, deserialize_with = "object")]
    pub crawl_rules: Map<String, Value>,
    #[serde(default, deserialize_with = "object")]
    pub social_tags: Map<String, Value>,
    #[serde(default, deserialize_with = "text_list")]
    pub redirects: Vec<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VulnScan {
    #[serde(rename = "puertos_abiertos", default, deserialize_with = "list")]
    pub open_ports: Vec<OpenPort>,
    #[serde(rename = "vulnerabilidades", default, deserialize_with = "list")]
    pub vulnerabilities: Vec<ServiceVulnerabilities>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OpenPort {
    #[serde(default, deserialize_with = "text")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub cpe: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceVulnerabilities {
    #[serde(rename = "puerto_servicio", default, deserialize_with = "text")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "list")]
    pub cves: Vec<Cve>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cve {
    #[serde(default, deserialize_with = "text")]
    pub cve_id: Option<String>,
    #[serde(rename = "severidad", default, deserialize_with = "text")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub cwe: Vec<String>,
    #[serde(rename = "descripcion", default, deserialize_with = "text")]
    pub description: Option<String>,
    #[serde(rename = "enlace_cve", default, deserialize_with = "text")]
    pub link: Option<String>,
    #[serde(rename = "referencias", default, deserialize_with = "text_list")]
    pub references: Vec<String>,
}

// ============================================================================
// Ratings
// ============================================================================

/// Qualitative band for a score or letter grade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Excellent,
    Good,
    Acceptable,
    HighRisk,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Rating::Excellent
        } else if score >= 70.0 {
            Rating::Good
        } else if score >= 50.0 {
            Rating::Acceptable
        } else {
            Rating::HighRisk
        }
    }

    pub fn from_grade(grade: &str) -> Self {
        match grade.trim().to_uppercase().as_str() {
            "A+" | "A" => Rating::Excellent,
            "B+" | "B" => Rating::Acceptable,
            _ => Rating::HighRisk,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Acceptable => "acceptable",
            Rating::HighRisk => "high risk",
        }
    }
}

/// First http(s) URL mentioned in a free-text summary
pub fn extract_url(summary: &str) -> Option<&str> {
    let start = summary
        .find("https://")
        .into_iter()
        .chain(summary.find("http://"))
        .min()?;
    summary[start..].split_whitespace().next()
}

// ============================================================================
// Report
// ============================================================================

/// Consolidated scan results reshaped for printing
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub user: String,
    pub url: String,
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    pub score: f64,
    pub classification: String,
    pub recommendations: Vec<String>,
    pub ssl: Option<SslScan>,
    pub dns: Option<DnsScan>,
    pub http: Option<HttpScan>,
    pub open_ports: Vec<OpenPort>,
    pub vulnerabilities: Vec<ServiceVulnerabilities>,
}

/// One page of rendered report text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPage {
    pub number: usize,
    pub total: usize,
    pub lines: Vec<String>,
}

impl ReportPage {
    pub fn footer(&self) -> String {
        format!("{} | Page {} of {}", GENERATED_BY, self.number, self.total)
    }
}

impl fmt::Display for ReportPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.footer())
    }
}

impl ScanReport {
    pub fn from_consolidated(
        info: ConsolidatedInfo,
        user: Option<&str>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let data = info.data;
        let summary = data.summary_recommendations.unwrap_or_default();

        let summary_text = summary.summary.unwrap_or_else(|| EMPTY.to_string());
        let url = data
            .url_info
            .and_then(|u| u.url)
            .or_else(|| extract_url(&summary_text).map(str::to_string))
            .unwrap_or_else(|| EMPTY.to_string());

        let vuln = data.vuln_scan.unwrap_or_default();
        let open_ports = if !vuln.open_ports.is_empty() {
            vuln.open_ports
        } else {
            data.ssl_scan
                .as_ref()
                .map(|s| s.open_ports.clone())
                .unwrap_or_default()
        };

        Self {
            user: user
                .filter(|u| !u.is_empty())
                .unwrap_or(EMPTY)
                .to_string(),
            url,
            generated_at,
            summary: summary_text,
            score: summary.score.filter(|s| s.is_finite()).unwrap_or(0.0),
            classification: summary
                .classification
                .unwrap_or_else(|| EMPTY.to_string()),
            recommendations: summary.recommendations,
            ssl: data.ssl_scan,
            dns: data.dns_scan,
            http: data.http_scan,
            open_ports,
            vulnerabilities: vuln.vulnerabilities,
        }
    }

    pub fn score_display(&self) -> String {
        if self.score.fract() == 0.0 {
            format!("{}", self.score as i64)
        } else {
            format!("{}", self.score)
        }
    }

    /// Render every section as text lines
    pub fn render_lines(&self) -> Vec<String> {
        let mut out = Lines::default();

        out.push(REPORT_TITLE);
        out.push("=".repeat(REPORT_TITLE.len()));
        out.field("Generated by", Some("scandash"));
        out.field(
            "Downloaded",
            Some(&self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        );
        out.field("User", Some(&self.user));
        out.field("Site URL", Some(&self.url));

        out.section("Executive summary");
        out.push(&self.summary);

        out.section("Score and classification");
        out.push(format!(
            "{:<width$} {} ({})",
            "Overall score:",
            self.score_display(),
            Rating::from_score(self.score).label(),
            width = LABEL_WIDTH
        ));
        out.push(format!(
            "{:<width$} {} ({})",
            "Overall classification:",
            self.classification,
            Rating::from_grade(&self.classification).label(),
            width = LABEL_WIDTH
        ));
        if let Some(grade) = self.ssl.as_ref().and_then(|s| s.grade.as_deref()) {
            out.field("SSL classification", Some(grade));
        }
        if let Some(grade) = self.http.as_ref().and_then(|h| h.security_grade.as_deref()) {
            out.field("HTTP grade", Some(grade));
        }

        out.section("Detailed recommendations");
        if self.recommendations.is_empty() {
            out.push(EMPTY);
        } else {
            out.bullets(&self.recommendations, 0);
        }

        if let Some(ref ssl) = self.ssl {
            render_ssl(&mut out, ssl);
        }
        if let Some(ref dns) = self.dns {
            render_dns(&mut out, dns);
        }
        if let Some(ref http) = self.http {
            render_http(&mut out, http);
        }
        self.render_ports(&mut out);
        self.render_vulnerabilities(&mut out);

        out.lines
    }

    fn render_ports(&self, out: &mut Lines) {
        out.section("Open ports");
        if self.open_ports.is_empty() {
            out.push("- No open ports detected");
            return;
        }
        let row = |port: &str, service: &str, product: &str, version: &str, cpe: &str| {
            format!("{:<8} {:<14} {:<22} {:<14} {}", port, service, product, version, cpe)
        };
        out.push(row("Port", "Service", "Product", "Version", "CPE"));
        for p in &self.open_ports {
            out.push(row(
                or_empty(&p.port),
                or_empty(&p.service),
                or_empty(&p.product),
                or_empty(&p.version),
                or_empty(&p.cpe),
            ));
        }
    }

    fn render_vulnerabilities(&self, out: &mut Lines) {
        out.section("Vulnerabilities by service/port");
        if self.vulnerabilities.is_empty() {
            out.push("- No known vulnerabilities detected");
            return;
        }
        for group in &self.vulnerabilities {
            out.push(format!("> {}", or_empty(&group.service)));
            if group.cves.is_empty() {
                out.push("  - No relevant CVEs found for this service");
                continue;
            }
            for cve in &group.cves {
                out.push(format!(
                    "  CVE: {}",
                    cve.cve_id.as_deref().unwrap_or("N/A")
                ));
                if let Some(ref severity) = cve.severity {
                    out.push(format!("    Severity: {}", severity));
                }
                if !cve.cwe.is_empty() {
                    out.push(format!("    CWE: {}", cve.cwe.join(", ")));
                }
                if let Some(ref description) = cve.description {
                    out.push(format!("    Description: {}", description));
                }
                if let Some(ref link) = cve.link {
                    out.push(format!("    Link: {}", link));
                }
                if !cve.references.is_empty() {
                    out.push("    References:");
                    out.bullets(&cve.references, 6);
                }
            }
        }
    }

    /// Split the rendered report into pages of at most `lines_per_page` lines
    pub fn paginate(&self, lines_per_page: usize) -> Vec<ReportPage> {
        let per_page = lines_per_page.max(1);
        let lines = self.render_lines();
        let chunks: Vec<Vec<String>> = if lines.is_empty() {
            vec![Vec::new()]
        } else {
            lines.chunks(per_page).map(|c| c.to_vec()).collect()
        };
        let total = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, lines)| ReportPage {
                number: i + 1,
                total,
                lines,
            })
            .collect()
    }

    /// Full report as text, pages separated by form feeds
    pub fn to_text(&self, lines_per_page: usize) -> String {
        self.paginate(lines_per_page)
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("\n\u{000C}\n")
    }
}

fn render_ssl(out: &mut Lines, ssl: &SslScan) {
    out.section("SSL/TLS details");
    out.field("Protocol", ssl.protocol.as_deref());
    out.field("Cipher", ssl.cipher.as_deref());
    out.field(
        "Key size",
        ssl.key_size.as_ref().map(|k| format!("{} bits", k)).as_deref(),
    );
    out.field("Key exchange group", ssl.key_exchange_group.as_deref());
    out.field("Key algorithm", ssl.key_algorithm.as_deref());
    out.field(
        "Validity",
        Some(&format!(
            "{} until {}",
            or_empty(&ssl.valid_from),
            or_empty(&ssl.valid_until)
        )),
    );
    out.field("Validity status", ssl.validity_status.as_deref());
    out.field("Issuer", ssl.issuer.as_deref());
    out.field("Revocation", ssl.revocation.as_deref());
    out.field("Self-signed", ssl.self_signed.map(yes_no));
    out.field("Security rating", ssl.security_rating.as_deref());
    if let Some(ref recommendations) = ssl.recommendations {
        out.field("SSL recommendations", Some(recommendations));
    }
}

fn render_dns(out: &mut Lines, dns: &DnsScan) {
    out.section("DNS and WHOIS details");
    out.push("DNS records:");
    for (label, records) in [
        ("A", &dns.a),
        ("AAAA", &dns.aaaa),
        ("CNAME", &dns.cname),
        ("MX", &dns.mx),
        ("NS", &dns.ns),
        ("TXT", &dns.txt),
    ] {
        if !records.is_empty() {
            out.push(format!("  {}:", label));
            out.bullets(records, 4);
        }
    }
    out.field("DNS provider", dns.provider.as_deref());
    out.field("DNSSEC enabled", dns.dnssec_enabled.map(yes_no));
    if let Some(ref details) = dns.dnssec_details {
        out.field("DNSSEC details", Some(details));
    }

    out.push("");
    out.push("WHOIS:");
    out.field("Domain name", dns.whois_domain.as_deref());
    out.field("Registrar", dns.whois_registrar.as_deref());
    out.field("Created", dns.whois_created.as_deref());
    out.field("Expires", dns.whois_expires.as_deref());
    if !dns.whois_name_servers.is_empty() {
        out.push("Name servers (WHOIS):");
        out.bullets(&dns.whois_name_servers, 2);
    }
    if !dns.whois_emails.is_empty() {
        out.push("Emails (WHOIS):");
        out.bullets(&dns.whois_emails, 2);
    }
    out.field("Organization (WHOIS)", dns.whois_organization.as_deref());
    out.field("Country (WHOIS)", dns.whois_country.as_deref());
    if let Some(ref error) = dns.whois_error {
        out.field("WHOIS error", Some(error));
    }
}

fn render_http(out: &mut Lines, http: &HttpScan) {
    out.section("HTTP security details");
    out.field("HTTP security grade", http.security_grade.as_deref());

    out.push("");
    out.push("HTTP security headers:");
    if http.http_security.is_empty() {
        out.push("  - No notable HTTP security headers");
    } else {
        out.entries(&http.http_security);
    }

    out.push("");
    out.push("robots.txt rules:");
    let robots = http
        .crawl_rules
        .get("robots.txt")
        .cloned()
        .and_then(value_text)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "Not available".to_string());
    for line in robots.lines() {
        out.push(format!("  {}", line));
    }

    if !http.social_tags.is_empty() {
        out.push("");
        out.push("Meta tags (social/SEO):");
        out.entries(&http.social_tags);
    }
    if !http.redirects.is_empty() {
        out.push("");
        out.push("Redirects:");
        out.bullets(&http.redirects, 2);
    }
    if !http.errors.is_empty() {
        out.push("");
        out.push("HTTP scan errors:");
        out.bullets(&http.errors, 2);
    }
}

fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(EMPTY)
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

/// Line accumulator with the report's formatting conventions
#[derive(Default)]
struct Lines {
    lines: Vec<String>,
}

impl Lines {
    /// Add text, splitting embedded newlines and wrapping at `REPORT_WIDTH`
    fn push(&mut self, text: impl Into<String>) {
        let text = text.into();
        for line in text.split('\n') {
            wrap_line(line.trim_end_matches('\r'), &mut self.lines);
        }
    }

    fn section(&mut self, title: &str) {
        self.push("");
        self.push(title);
        self.push("-".repeat(title.chars().count()));
    }

    fn field(&mut self, label: &str, value: Option<&str>) {
        let value = value.filter(|v| !v.is_empty()).unwrap_or(EMPTY);
        self.push(format!(
            "{:<width$} {}",
            format!("{}:", label),
            value,
            width = LABEL_WIDTH
        ));
    }

    fn bullets(&mut self, items: &[String], indent: usize) {
        for item in items {
            let item = if item.is_empty() { EMPTY } else { item };
            self.push(format!("{:indent$}* {}", "", item, indent = indent));
        }
    }

    fn entries(&mut self, map: &Map<String, Value>) {
        for (key, value) in map {
            let value = value_text(value.clone())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| EMPTY.to_string());
            self.push(format!("  * {}: {}", key, value));
        }
    }
}

/// Wrap one line at word boundaries. Continuations keep the line's
/// indentation plus two spaces; words longer than the width are split.
fn wrap_line(line: &str, out: &mut Vec<String>) {
    if line.chars().count() <= REPORT_WIDTH {
        out.push(line.to_string());
        return;
    }

    let body = line.trim_start();
    let indent: String = line[..line.len() - body.len()]
        .chars()
        .take(REPORT_WIDTH / 2)
        .collect();
    let continuation: String = format!("{}  ", indent).chars().take(REPORT_WIDTH / 2).collect();

    if body.is_empty() {
        out.push(String::new());
        return;
    }

    let mut current = indent;
    let mut current_len = current.chars().count();
    let mut has_word = false;

    for word in body.split_whitespace() {
        let mut word = word;
        loop {
            let word_len = word.chars().count();
            let needed = if has_word { word_len + 1 } else { word_len };
            if current_len + needed <= REPORT_WIDTH {
                if has_word {
                    current.push(' ');
                }
                current.push_str(word);
                current_len += needed;
                has_word = true;
                break;
            }
            if has_word {
                out.push(std::mem::replace(&mut current, continuation.clone()));
                current_len = current.chars().count();
                has_word = false;
                continue;
            }
            // A single word wider than the remaining space
            let room = REPORT_WIDTH - current_len;
            let split = word
                .char_indices()
                .nth(room)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            current.push_str(&word[..split]);
            out.push(std::mem::replace(&mut current, continuation.clone()));
            current_len = current.chars().count();
            word = &word[split..];
            if word.is_empty() {
                break;
            }
        }
    }
    if has_word {
        out.push(current);
    }
}
