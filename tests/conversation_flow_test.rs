//! 对话流程集成测试：经由 ChatRuntime 驱动完整会话（Stub 分类器 + 内存存储 + 固定汇率）

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agil::agent::create_runtime_with;
    use agil::agents::Services;
    use agil::bank::{
        Customer, CustomerStore, IncreaseOutcome, InMemoryCustomerStore, LimitService, ScoreRule,
        ScoringTable,
    };
    use agil::classifier::schemas::{
        AnswerValidation, CreditIntent, CurrencyExtraction, ExitIntent, GreetingIntent,
        InterviewProfile, OfferResponse, TriageIntent,
    };
    use agil::classifier::StubClassifier;
    use agil::config::SessionSection;
    use agil::core::{Step, TriageStage};
    use agil::gateway::ChatRuntime;
    use agil::tools::{CurrencyCode, StaticRateSource};
    use chrono::NaiveDate;
    use serde_json::json;

    fn ana() -> Customer {
        Customer {
            tax_id: "12345678901".to_string(),
            name: "Ana Souza".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            current_limit: 2500.0,
            score: 620,
        }
    }

    fn score_table() -> ScoringTable {
        ScoringTable::new(vec![
            ScoreRule { min_score: 0, max_score: 399, max_limit: 2000.0 },
            ScoreRule { min_score: 400, max_score: 599, max_limit: 3500.0 },
            ScoreRule { min_score: 600, max_score: 799, max_limit: 5000.0 },
            ScoreRule { min_score: 800, max_score: 1000, max_limit: 10000.0 },
        ])
    }

    /// 按关键词做出决定的分类器，近似真实模型在这些输入上的输出
    fn classifier() -> StubClassifier {
        StubClassifier::new()
            .on::<ExitIntent>(|text| json!({"is_exit": text.contains("tchau")}))
            .on::<GreetingIntent>(|text| json!({"is_greeting": text.starts_with("Ol")}))
            .on::<TriageIntent>(|text| {
                let category = if text.contains("limite") {
                    "CREDIT"
                } else if text.contains("dólar") || text.contains("euro") {
                    "EXCHANGE"
                } else {
                    "OTHER"
                };
                json!({ "category": category })
            })
            .on::<CreditIntent>(|text| {
                let value: Option<f64> = text
                    .split_whitespace()
                    .find_map(|word| word.parse().ok());
                if text.contains("qual") {
                    json!({"intent": "CHECK_LIMIT"})
                } else {
                    json!({"intent": "REQUEST_INCREASE", "value": value})
                }
            })
            .on::<OfferResponse>(|text| {
                let decision = if text == "sim" { "ACCEPT" } else { "DECLINE" };
                json!({ "decision": decision })
            })
            .on::<AnswerValidation>(|_| json!({"valid": true}))
            .on::<InterviewProfile>(|_| {
                json!({
                    "income": 6000.0,
                    "job_type": "formal",
                    "expenses": 2000.0,
                    "dependents": 1,
                    "has_debts": false
                })
            })
            .on::<CurrencyExtraction>(|text| {
                let code = if text.contains("euro") { "EUR" } else { "USD" };
                json!({ "currency_code": code })
            })
    }

    fn runtime_with(rates: StaticRateSource) -> (Arc<InMemoryCustomerStore>, ChatRuntime) {
        let store = Arc::new(InMemoryCustomerStore::with_customers([ana()]));
        let customers: Arc<dyn CustomerStore> = store.clone();
        let services = Services {
            classifier: Arc::new(classifier()),
            customers: customers.clone(),
            limits: LimitService::new(customers, Arc::new(score_table())),
            rates: Arc::new(rates),
        };
        (store, create_runtime_with(&services, &SessionSection::default()))
    }

    fn runtime() -> (Arc<InMemoryCustomerStore>, ChatRuntime) {
        runtime_with(StaticRateSource::new().with_rate(CurrencyCode::Usd, 5.4321))
    }

    async fn authenticate(rt: &ChatRuntime, session: &str) -> String {
        rt.handle_message(session, "Olá").await;
        rt.handle_message(session, "123.456.789-01").await;
        rt.handle_message(session, "1990-05-10").await.response
    }

    #[tokio::test]
    async fn test_authentication_then_rejection_interview_and_approval() {
        let (store, rt) = runtime();

        let reply = rt.handle_message("s", "Olá").await;
        assert!(reply.response.contains("CPF"));
        let reply = rt.handle_message("s", "123.456.789-01").await;
        assert!(reply.response.contains("data de nascimento"));
        let reply = rt.handle_message("s", "1990-05-10").await;
        assert!(reply.response.starts_with("Olá Ana Souza"));

        // score 620 permite no máximo 5000
        let reply = rt.handle_message("s", "quero aumentar meu limite para 9000").await;
        assert!(reply.response.contains("negado"));
        assert!(reply.response.contains("R$ 5000.00"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.active_step, Step::InterviewOffer);

        let reply = rt.handle_message("s", "sim").await;
        assert!(reply.response.starts_with("Ótimo!"));
        assert!(reply.response.ends_with(agil::agents::interview::QUESTIONS[0]));

        for answer in ["6000", "formal", "2000", "1"] {
            rt.handle_message("s", answer).await;
        }
        let reply = rt.handle_message("s", "não").await;
        assert!(reply.response.contains("novo score é 569"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.active_step, Step::CreditAgent);
        assert_eq!(state.interview_progress, 0);
        assert_eq!(state.customer.as_ref().map(|c| c.score), Some(569));

        // 569 cai na faixa 400-599 (máximo 3500)
        let reply = rt.handle_message("s", "quero 3000").await;
        assert!(reply.response.contains("aprovado"));

        let stored = store.lookup_by_id("12345678901").await.unwrap().unwrap();
        assert_eq!(stored.score, 569);
        assert_eq!(stored.current_limit, 3000.0);

        let outcomes: Vec<_> = store.requests().iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![IncreaseOutcome::Rejected, IncreaseOutcome::Approved]);
    }

    #[tokio::test]
    async fn test_exchange_quote_and_unavailable_rate() {
        let (_, rt) = runtime();
        authenticate(&rt, "s").await;

        let reply = rt.handle_message("s", "cotação do dólar").await;
        assert!(reply.response.contains("USD"));
        assert!(reply.response.contains("R$ 5.43"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.active_step, Step::Triage);

        // sem cotação de euro configurada: mensagem de indisponibilidade, sessão continua
        let reply = rt.handle_message("s", "e o euro?").await;
        assert!(reply.response.contains("Não consegui obter a cotação do EUR"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.triage_stage, TriageStage::Authenticated);
    }

    #[tokio::test]
    async fn test_three_failed_authentications_are_terminal() {
        let (_, rt) = runtime();
        rt.handle_message("s", "Olá").await;

        for attempt in 1..=2 {
            rt.handle_message("s", "12345678901").await;
            let reply = rt.handle_message("s", "2000-01-01").await;
            assert!(reply.response.contains(&format!("Tentativa {}/3", attempt)));
        }
        rt.handle_message("s", "12345678901").await;
        let reply = rt.handle_message("s", "2000-01-01").await;
        assert!(reply.response.contains("suporte"));

        // a data correta não reabre a autenticação
        let reply = rt.handle_message("s", "1990-05-10").await;
        assert!(reply.response.contains("suporte"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.triage_stage, TriageStage::Failed);
        assert_eq!(state.auth_attempts, 3);
        assert!(state.customer.is_none());
    }

    #[tokio::test]
    async fn test_welcome_is_sent_once() {
        let (_, rt) = runtime();
        let welcome = authenticate(&rt, "s").await;
        assert!(welcome.contains("autenticação realizada com sucesso"));

        let reply = rt.handle_message("s", "oi de novo").await;
        assert!(reply.response.contains("crédito"));

        let state = rt.sessions().get("s").await.unwrap();
        let welcomes = state
            .messages
            .iter()
            .filter(|m| m.content.contains("autenticação realizada com sucesso"))
            .count();
        assert_eq!(welcomes, 1);
    }

    #[tokio::test]
    async fn test_exit_resets_to_greeting() {
        let (_, rt) = runtime();
        authenticate(&rt, "s").await;

        let reply = rt.handle_message("s", "tchau").await;
        assert!(reply.response.contains("Atendimento finalizado"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.triage_stage, TriageStage::Greeting);
        assert!(state.customer.is_none());

        let reply = rt.handle_message("s", "Olá").await;
        assert!(reply.response.contains("CPF"));
    }

    #[tokio::test]
    async fn test_check_limit_returns_to_triage() {
        let (_, rt) = runtime();
        authenticate(&rt, "s").await;

        let reply = rt.handle_message("s", "qual meu limite?").await;
        assert!(reply.response.contains("R$ 2500.00"));
        let state = rt.sessions().get("s").await.unwrap();
        assert_eq!(state.active_step, Step::Triage);
    }
}
