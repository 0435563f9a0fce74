use actix_web::{
    delete, get,
    http::header::{self, ContentDisposition, DispositionParam, DispositionType},
    post,
    web::{self, Data},
    HttpRequest, HttpResponse, Responder, ResponseError,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tera::Context;

use crate::{
    auth::{self, AuthUser},
    calculator::{self, FeeInput},
    db,
    errors::AppError,
    models::{FixedCosts, ProfileUpdate, User},
    proposals::{self, ProposalView},
    render::{self, ProposalDocument},
    AppState, TEMPLATES,
};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Registers every page and API route. Shared by `main` and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let failure = AppError::ValidationError(format!("Dados inválidos: {err}"));
        log::warn!("Rejected JSON body: {}", err);
        actix_web::error::InternalError::from_response(err, json_failure(&failure)).into()
    }))
    .service(login_handler)
        .service(login_form_handler)
        .service(register_handler)
        .service(register_form_handler)
        .service(logout_handler)
        .service(dashboard_handler)
        .service(new_calculation_handler)
        .service(history_handler)
        .service(fixed_costs_handler)
        .service(fixed_costs_form_handler)
        .service(settings_handler)
        .service(settings_form_handler)
        .service(deactivate_handler)
        .service(calculate_api)
        .service(save_proposal_api)
        .service(list_proposals_api)
        .service(get_proposal_api)
        .service(delete_proposal_api)
        .service(export_pdf_api);
}

fn render_page(template: &str, context: &Context) -> Result<String, AppError> {
    TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template {}: {}", template, e);
        AppError::TemplateError(e)
    })
}

fn html(status: actix_web::http::StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn page(template: &str, context: &Context) -> Result<HttpResponse, AppError> {
    Ok(html(actix_web::http::StatusCode::OK, render_page(template, context)?))
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .finish()
}

fn json_failure(err: &AppError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(json!({
        "success": false,
        "error": err.public_message(),
    }))
}

fn base_context(title: &str, user: Option<&AuthUser>) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("version", env!("CARGO_PKG_VERSION"));
    if let Some(user) = user {
        context.insert("user_nome", &user.name);
    }
    context
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

// ============== AUTH ==============

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    senha: String,
}

#[get("/login")]
pub async fn login_handler() -> Result<impl Responder, AppError> {
    page("login.html", &base_context("Entrar", None))
}

#[post("/login")]
pub async fn login_form_handler(
    web::Form(form): web::Form<LoginForm>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let email = form.email.trim().to_lowercase();
    let user = match db::get_active_user_by_email(&state, &email).await {
        Ok(user) => user,
        Err(e) => {
            log::error!("Failed to look up user for login: {}", e);
            let mut context = base_context("Entrar", None);
            context.insert("erro", "Erro ao fazer login");
            return Ok(html(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                render_page("login.html", &context)?,
            ));
        }
    };

    let authenticated = user.filter(|u| match auth::verify_password(&form.senha, &u.pwd_hash) {
        Ok(ok) => ok,
        Err(e) => {
            log::warn!("Stored password hash for user {} is unreadable: {}", u.id, e);
            false
        }
    });

    match authenticated {
        Some(user) => {
            auth::sign_in(&request, &user)?;
            log::info!("User {} logged in", user.id);
            Ok(see_other("/"))
        }
        None => {
            let mut context = base_context("Entrar", None);
            context.insert("erro", &AppError::AuthenticationError.to_string());
            Ok(html(
                AppError::AuthenticationError.status_code(),
                render_page("login.html", &context)?,
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterForm {
    nome_completo: String,
    email: String,
    senha: String,
    #[serde(default)]
    numero_crp: String,
    #[serde(default)]
    telefone: String,
}

fn validate_registration(form: &RegisterForm) -> Result<(), AppError> {
    if form.nome_completo.trim().is_empty() || form.email.trim().is_empty() || form.senha.is_empty() {
        return Err(AppError::ValidationError("Preencha nome, email e senha".into()));
    }
    if !form.email.contains('@') {
        return Err(AppError::ValidationError("Email inválido".into()));
    }
    validate_password(&form.senha)
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError(format!(
            "A senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::ValidationError(format!(
            "A senha deve ter no máximo {MAX_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

#[get("/registro")]
pub async fn register_handler() -> Result<impl Responder, AppError> {
    page("register.html", &base_context("Criar conta", None))
}

#[post("/registro")]
pub async fn register_form_handler(
    web::Form(form): web::Form<RegisterForm>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let fail = |err: AppError| -> Result<HttpResponse, AppError> {
        let mut context = base_context("Criar conta", None);
        context.insert("erro", &err.public_message());
        Ok(html(err.status_code(), render_page("register.html", &context)?))
    };

    if let Err(e) = validate_registration(&form) {
        return fail(e);
    }
    let email = form.email.trim().to_lowercase();

    match db::email_exists(&state, &email).await {
        Ok(true) => return fail(AppError::ValidationError("Email já cadastrado".into())),
        Ok(false) => {}
        Err(e) => {
            log::error!("Failed to check email availability: {}", e);
            return fail(AppError::DatabaseError(e));
        }
    }

    let user = match db::create_user(
        &state,
        form.nome_completo.trim().to_owned(),
        email,
        &form.senha,
        non_empty(form.numero_crp),
        non_empty(form.telefone),
    )
    .await
    {
        Ok(user) => user,
        Err(e) => {
            log::error!("Failed to create user: {}", e);
            return fail(e);
        }
    };

    // Not atomic with the insert above: a failure here leaves the account without a profile.
    if let Err(e) = db::insert_fixed_costs(&state, user.id, &FixedCosts::default()).await {
        log::error!("Failed to create default fixed costs for user {}: {}", user.id, e);
    }

    Ok(see_other("/login"))
}

#[get("/logout")]
pub async fn logout_handler(request: HttpRequest) -> impl Responder {
    auth::sign_out(&request);
    see_other("/login")
}

// ============== PAGES ==============

#[get("/")]
pub async fn dashboard_handler(
    state: Data<AppState>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let mut context = base_context("Painel", Some(&user));
    match db::proposal_summary(&state, user.id).await {
        Ok((count, total)) => {
            context.insert("total_orcamentos", &count);
            context.insert("soma_orcamentos", &render::money(total));
        }
        Err(e) => log::error!("Failed to load dashboard summary for user {}: {}", user.id, e),
    }
    page("dashboard.html", &context)
}

#[get("/novo-calculo")]
pub async fn new_calculation_handler(
    state: Data<AppState>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let costs = match db::get_fixed_costs(&state, user.id).await {
        Ok(costs) => costs,
        Err(e) => {
            log::error!("Failed to load fixed costs for user {}: {}", user.id, e);
            None
        }
    };
    let mut context = base_context("Novo cálculo", Some(&user));
    context.insert("tem_custos", &costs.is_some());
    let costs = costs.unwrap_or_default();
    context.insert("custo_hora", &format!("{:.2}", calculator::hourly_overhead(&costs)));
    context.insert("sugestao_hora", &format!("{:.2}", calculator::suggested_rate(&costs)));
    page("new_calculation.html", &context)
}

#[derive(Serialize)]
struct HistoryRow {
    id: i64,
    numero: String,
    nome_cliente: String,
    tipo_servico: String,
    valor_total: String,
    data: String,
}

#[get("/historico")]
pub async fn history_handler(
    state: Data<AppState>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let mut context = base_context("Histórico", Some(&user));
    match proposals::list(&state, &user).await {
        Ok(list) => {
            let rows: Vec<HistoryRow> = list
                .into_iter()
                .map(|p| HistoryRow {
                    id: p.id,
                    numero: p.number,
                    nome_cliente: render::or_not_informed(p.client_name.as_deref()),
                    tipo_servico: render::or_not_informed(p.service_type.as_deref()),
                    valor_total: render::money(p.total_value),
                    data: render::date_br(&p.created_at),
                })
                .collect();
            context.insert("orcamentos", &rows);
        }
        Err(e) => {
            context.insert("orcamentos", &Vec::<HistoryRow>::new());
            context.insert("erro", &e.public_message());
        }
    }
    page("history.html", &context)
}

#[get("/custos-fixos")]
pub async fn fixed_costs_handler(
    state: Data<AppState>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let mut context = base_context("Custos fixos", Some(&user));
    match db::get_fixed_costs(&state, user.id).await {
        Ok(costs) => context.insert("custos", &costs),
        Err(e) => {
            log::error!("Failed to load fixed costs for user {}: {}", user.id, e);
            context.insert("custos", &None::<FixedCosts>);
            context.insert("erro", &AppError::DatabaseError(e).public_message());
        }
    }
    page("fixed_costs.html", &context)
}

#[derive(Deserialize)]
pub struct FixedCostsForm {
    aluguel_consultorio: Option<String>,
    internet_telefonia: Option<String>,
    ferramentas_software: Option<String>,
    anuidade_crp: Option<String>,
    funcionarios_salarios: Option<String>,
    outros_custos: Option<String>,
    horas_trabalhadas_mes: Option<String>,
}

fn form_number(label: &str, raw: Option<&str>, default: f64) -> Result<f64, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| AppError::ValidationError(format!("Valor inválido em {label}: {v}"))),
    }
}

impl FixedCostsForm {
    fn parse(&self) -> Result<FixedCosts, AppError> {
        let hours = match self.horas_trabalhadas_mes.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => 160,
            Some(v) => v.parse::<i64>().map_err(|_| {
                AppError::ValidationError(format!("Valor inválido em horas trabalhadas: {v}"))
            })?,
        };
        Ok(FixedCosts {
            rent: form_number("aluguel", self.aluguel_consultorio.as_deref(), 0.0)?,
            internet_phone: form_number("internet/telefonia", self.internet_telefonia.as_deref(), 0.0)?,
            tools_software: form_number("ferramentas", self.ferramentas_software.as_deref(), 0.0)?,
            annual_dues: form_number("anuidade", self.anuidade_crp.as_deref(), 0.0)?,
            payroll: form_number("funcionários", self.funcionarios_salarios.as_deref(), 0.0)?,
            other_costs: form_number("outros custos", self.outros_custos.as_deref(), 0.0)?,
            hours_per_month: hours,
        })
    }
}

#[post("/custos-fixos")]
pub async fn fixed_costs_form_handler(
    web::Form(form): web::Form<FixedCostsForm>,
    state: Data<AppState>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let result = match form.parse() {
        Ok(costs) => db::upsert_fixed_costs(&state, user.id, &costs)
            .await
            .map_err(|e| {
                log::error!("Failed to save fixed costs for user {}: {}", user.id, e);
                AppError::DatabaseError(e)
            }),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(see_other("/custos-fixos")),
        Err(e) => {
            let mut context = base_context("Custos fixos", Some(&user));
            let current = db::get_fixed_costs(&state, user.id).await.ok().flatten();
            context.insert("custos", &current);
            context.insert("erro", &e.public_message());
            Ok(html(e.status_code(), render_page("fixed_costs.html", &context)?))
        }
    }
}

#[get("/configuracoes")]
pub async fn settings_handler(
    state: Data<AppState>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let mut context = base_context("Configurações", Some(&user));
    match db::get_user_by_id(&state, user.id).await {
        Ok(profile) => context.insert("user", &profile),
        Err(e) => {
            log::error!("Failed to load profile of user {}: {}", user.id, e);
            context.insert("user", &None::<User>);
            context.insert("erro", &AppError::DatabaseError(e).public_message());
        }
    }
    page("settings.html", &context)
}

#[derive(Deserialize)]
pub struct SettingsForm {
    nome_completo: String,
    #[serde(default)]
    numero_crp: String,
    #[serde(default)]
    telefone: String,
    #[serde(default)]
    nova_senha: String,
}

#[post("/configuracoes")]
pub async fn settings_form_handler(
    web::Form(form): web::Form<SettingsForm>,
    state: Data<AppState>,
    user: AuthUser,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let result: Result<User, AppError> = async {
        let full_name = non_empty(form.nome_completo)
            .ok_or_else(|| AppError::ValidationError("Informe o nome completo".into()))?;
        let new_pwd_hash = match non_empty(form.nova_senha) {
            Some(password) => {
                validate_password(&password)?;
                Some(auth::hash_password(&password)?)
            }
            None => None,
        };
        db::update_user(
            &state,
            user.id,
            ProfileUpdate {
                full_name,
                crp_number: non_empty(form.numero_crp),
                phone: non_empty(form.telefone),
                new_pwd_hash,
            },
        )
        .await
    }
    .await;

    match result {
        Ok(updated) => {
            auth::remember_name(&request, &updated.full_name)?;
            Ok(see_other("/configuracoes"))
        }
        Err(e) => {
            log::warn!("Profile update for user {} failed: {}", user.id, e);
            let mut context = base_context("Configurações", Some(&user));
            let profile = db::get_user_by_id(&state, user.id).await.ok().flatten();
            context.insert("user", &profile);
            context.insert("erro", &e.public_message());
            Ok(html(e.status_code(), render_page("settings.html", &context)?))
        }
    }
}

#[post("/configuracoes/desativar")]
pub async fn deactivate_handler(
    state: Data<AppState>,
    user: AuthUser,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    db::deactivate_user(&state, user.id).await.map_err(|e| {
        log::error!("Failed to deactivate user {}: {}", user.id, e);
        AppError::DatabaseError(e)
    })?;
    auth::sign_out(&request);
    Ok(see_other("/login"))
}

// ============== API ==============

#[post("/api/calcular")]
pub async fn calculate_api(
    web::Json(input): web::Json<FeeInput>,
    state: Data<AppState>,
    user: AuthUser,
) -> HttpResponse {
    match db::get_fixed_costs(&state, user.id).await {
        Ok(costs) => HttpResponse::Ok().json(calculator::quote(&input, costs.as_ref())),
        Err(e) => {
            log::error!("Failed to load fixed costs for user {}: {}", user.id, e);
            json_failure(&AppError::DatabaseError(e))
        }
    }
}

#[post("/api/salvar-orcamento")]
pub async fn save_proposal_api(
    body: web::Bytes,
    state: Data<AppState>,
    user: AuthUser,
) -> HttpResponse {
    match proposals::create(&state, &user, &body).await {
        Ok(created) => HttpResponse::Ok().json(json!({
            "success": true,
            "id": created.id,
            "numero": created.numero,
        })),
        Err(e) => json_failure(&e),
    }
}

#[get("/api/orcamentos")]
pub async fn list_proposals_api(state: Data<AppState>, user: AuthUser) -> HttpResponse {
    match proposals::list(&state, &user).await {
        Ok(list) => HttpResponse::Ok().json(
            list.into_iter()
                .map(ProposalView::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => json_failure(&e),
    }
}

#[get("/api/orcamento/{id}")]
pub async fn get_proposal_api(
    state: Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    match proposals::get(&state, &user, path.into_inner()).await {
        Ok(proposal) => HttpResponse::Ok().json(ProposalView::from(proposal)),
        Err(e @ AppError::NotFound) => {
            HttpResponse::NotFound().json(json!({ "error": e.public_message() }))
        }
        Err(e) => json_failure(&e),
    }
}

#[delete("/api/deletar-orcamento/{id}")]
pub async fn delete_proposal_api(
    state: Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    match proposals::delete(&state, &user, path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => json_failure(&e),
    }
}

#[get("/api/gerar-pdf/{id}")]
pub async fn export_pdf_api(
    state: Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let proposal = proposals::get(&state, &user, id).await.map_err(|e| match e {
        AppError::NotFound => e,
        other => AppError::RenderError(other.to_string()),
    })?;
    let issuer = db::get_user_by_id(&state, user.id)
        .await
        .map_err(|e| AppError::RenderError(e.to_string()))?
        .ok_or(AppError::NotFound)?;

    let filename = format!("proposta_{}.pdf", proposal.number);
    let generated_at = Local::now().naive_local();
    let bytes = web::block(move || {
        render::render(&ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at,
        })
        .map_err(|e| match e {
            AppError::RenderError(detail) => detail,
            other => other.to_string(),
        })
    })
    .await
    .map_err(|e| AppError::RenderError(e.to_string()))?
    .map_err(|detail| {
        log::error!("Failed to render PDF for proposal {}: {}", id, detail);
        AppError::RenderError(detail)
    })?;

    log::info!("Rendered {} for user {}", filename, user.id);
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(bytes))
}
