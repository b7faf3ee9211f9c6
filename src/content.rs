//! Fixed conversational content: menus, message templates, the invalid-reply
//! pool, and the knowledge base fed to the generative fallback.
//!
//! All client-facing text is Brazilian Portuguese; the code around it is not.
//! Templates use a `{nome}` placeholder filled at render time.

/// Agency display name.
pub const BOT_NAME: &str = "Travessia dos Sonhos";

/// Business hours, rendered into confirmation templates.
pub const BUSINESS_HOURS: &str = "Segunda a sexta: 9h às 20h\nSábados: 9h às 18h";

/// Pool of playful replies for inputs that don't match any menu option.
/// One is picked uniformly at random per invalid turn; the variety is
/// intentional.
pub const INVALID_REPLIES: &[&str] = &[
    "🤔 Hmm, não encontrei essa opção no cardápio de bordo! Por favor, escolha uma das opções disponíveis.",
    "😅 Parece que estamos em mares diferentes! Pode escolher uma das opções numeradas?",
    "🧭 Precisamos seguir a rota planejada! Por favor, selecione uma das opções acima.",
    "🚢 Nossa bússola está apontando para as opções numeradas! Pode escolher uma delas?",
    "✨ Que criatividade! Mas para seguirmos viagem, precisamos de uma das opções listadas.",
    "🌊 Ops! Essa resposta caiu no mar. Vamos tentar novamente com uma das opções numeradas?",
];

/// Greeting words matched exactly or as a `word + space` prefix.
pub const GREETING_WORDS: &[&str] = &[
    "oi", "olá", "ola", "ei", "e ai", "eai", "hello", "hi", "hey", "hola",
];

/// Greeting phrases, matched the same way as the words.
pub const GREETING_PHRASES: &[&str] = &["bom dia", "boa tarde", "boa noite", "tudo bem"];

/// Start commands, matched exactly. "menu" is deliberately absent: it is a
/// navigation command handled by the state machine, not a conversation reset.
pub const START_COMMANDS: &[&str] = &["ajuda", "iniciar", "começar", "start", "help"];

/// Words that re-trigger the human-escalation confirmation from the terminal
/// stage.
pub const HELP_WORDS: &[&str] = &["atendimento", "ajuda", "especialista", "falar"];

/// Portuguese spelled-out numbers accepted as menu choices.
pub const NUMBER_WORDS: &[&str] = &[
    "um", "dois", "três", "quatro", "cinco", "seis", "sete", "oito", "nove", "dez",
];

// ── Menus ───────────────────────────────────────────────────────────

/// A static menu definition. Rendered by [`render_menu`].
pub struct Menu {
    pub title: &'static str,
    pub subtitle: Option<&'static str>,
    pub question: Option<&'static str>,
    pub options: &'static [&'static str],
    pub footer: Option<&'static str>,
}

pub const MAIN_MENU: Menu = Menu {
    title: "✨ Bem-vindo à Travessia dos Sonhos, {nome}! ✨",
    subtitle: Some(
        "É um prazer tê-lo(a) a bordo! Estamos prontos para transformar seus sonhos de viagem em realidade.",
    ),
    question: Some("Como podemos auxiliá-lo(a) hoje?"),
    options: &[
        "Conheça nossa tripulação - Descubra quem somos e nossa paixão por cruzeiros",
        "Hora de navegar - Planeje sua próxima aventura marítima",
        "Fale com um de nossos especialistas - Atendimento personalizado para suas dúvidas",
    ],
    footer: None,
};

pub const INTERESTS_MENU: Menu = Menu {
    title: "Quais aspectos de um cruzeiro mais chamam sua atenção?",
    subtitle: None,
    question: None,
    options: &[
        "🍽️ Gastronomia (buffets, restaurantes temáticos)",
        "🎭 Entretenimento (shows, cassino, festas)",
        "🌴 Destinos exóticos (praias, cidades históricas)",
        "🧖‍♂️ Relaxamento (spa, piscinas, áreas adultos)",
        "👨‍👩‍👧‍👦 Atividades para família",
        "✨ Tudo isso! Quero a experiência completa!",
    ],
    footer: None,
};

pub const PERIOD_MENU: Menu = Menu {
    title: "🗓️ Qual seria o melhor período para sua viagem?",
    subtitle: None,
    question: None,
    options: &[
        "Primeiros meses do ano (Jan-Mar)",
        "Meio do ano (Abr-Jun)",
        "Férias de julho",
        "Segundo semestre (Ago-Out)",
        "Final do ano (Nov-Dez)",
        "Ainda não decidi, quero sugestões!",
    ],
    footer: None,
};

pub const DURATION_MENU: Menu = Menu {
    title: "⏱️ Qual seria a duração ideal para seu cruzeiro?",
    subtitle: None,
    question: None,
    options: &[
        "Mini-cruzeiro (3-5 dias)",
        "Cruzeiro padrão (6-9 dias)",
        "Cruzeiro estendido (10-14 dias)",
        "Longa duração (15+ dias)",
        "Ainda não decidi, podem me recomendar?",
    ],
    footer: None,
};

pub const DESTINATION_MENU: Menu = Menu {
    title: "🌎 Qual região mais te interessa para seu próximo cruzeiro?",
    subtitle: None,
    question: None,
    options: &[
        "Brasil",
        "Caribe e Bahamas",
        "Mediterrâneo",
        "Europa e Escandinávia",
        "América do Sul",
        "Alasca",
        "Ásia e Oceania",
        "Outro destino ou não sei decidir ainda",
    ],
    footer: None,
};

pub const CONTACT_METHOD_MENU: Menu = Menu {
    title: "📱 Qual seria a melhor forma para entrarmos em contato com você?",
    subtitle: None,
    question: None,
    options: &["WhatsApp", "Ligação telefônica", "Vídeo-chamada"],
    footer: None,
};

pub const CONTACT_TIME_MENU: Menu = Menu {
    title: "🕒 Qual seria o melhor horário para este contato?",
    subtitle: None,
    question: None,
    options: &[
        "Manhã (9h-12h)",
        "Horário de almoço (12h-14h)",
        "Tarde (14h-18h)",
        "Noite (18h-20h)",
        "Qualquer horário dentro do nosso funcionamento",
    ],
    footer: Some("Nosso horário de atendimento: Segunda a sexta: 9h às 20h\nSábados: 9h às 18h"),
};

const OPTION_EMOJIS: &[&str] = &[
    "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟",
];

/// Render a menu: title (with `{nome}` substituted), subtitle, question,
/// numbered options, footer. Blank-line separated.
pub fn render_menu(menu: &Menu, name: Option<&str>) -> String {
    let mut out = String::new();

    let title = match name {
        Some(n) => menu.title.replace("{nome}", n),
        None => menu.title.replace("{nome}", ""),
    };
    out.push_str(title.trim());
    out.push_str("\n\n");

    if let Some(subtitle) = menu.subtitle {
        out.push_str(subtitle);
        out.push_str("\n\n");
    }
    if let Some(question) = menu.question {
        out.push_str(question);
        out.push_str("\n\n");
    }
    for (i, option) in menu.options.iter().enumerate() {
        out.push_str(OPTION_EMOJIS[i]);
        out.push(' ');
        out.push_str(option);
        out.push_str("\n\n");
    }
    if let Some(footer) = menu.footer {
        out.push_str("\n\n");
        out.push_str(footer);
    }

    out.trim().to_string()
}

// ── Message templates ───────────────────────────────────────────────

pub const WELCOME: &str = "🌊✨ *Travessia dos Sonhos* ✨🌊\nSeja bem-vindo(a) à bordo!\n\n✍️ Pra começarmos, me diga seu *nome*, por favor.";

pub const ASK_EMAIL: &str = "📧 Agora me diga seu *e-mail*, por favor.";

pub fn invalid_email(name: &str) -> String {
    format!(
        "❌ {name}, o e-mail informado não parece válido. Por favor, informe um e-mail no formato correto (exemplo@dominio.com)."
    )
}

pub fn service_requested(name: &str) -> String {
    format!(
        "✨ {name}, sua solicitação foi registrada! Um especialista entrará em contato em breve.\n\nHorário de atendimento: {BUSINESS_HOURS}"
    )
}

/// Static acknowledgement for messages arriving after escalation.
pub fn service_pending_ack(name: &str) -> String {
    format!(
        "✨ {name}, sua solicitação já foi registrada! Um especialista entrará em contato em breve conforme solicitado. \
         Horário de atendimento: {BUSINESS_HOURS}\n\n\
         Caso precise de atendimento imediato, você também pode nos contatar pelo telefone \
         ou WhatsApp: (11) 91529-0344"
    )
}

/// Company presentation, ending with the prior-experience question.
pub fn company_intro(name: &str) -> String {
    format!(
        "🌊 Olá {name}! Somos a Travessia dos Sonhos, agência especializada em cruzeiros marítimos.\n\n\
         📌 CNPJ: 48.814.173/0001-70\n\
         🛟 CADASTUR: Agência certificada\n\
         📍 Localização: Atibaia/SP\n\n\
         🌐 Site: travessiadossonhos.com.br\n\
         📸 Instagram: @travessiadossonhos\n\n\
         {EXPERIENCE_QUESTION}"
    )
}

/// Prior-experience question, also used standalone as the re-prompt for
/// invalid input at that stage.
pub const EXPERIENCE_QUESTION: &str =
    "Você já teve alguma experiência anterior com cruzeiros marítimos?\n\n1️⃣ Sim\n2️⃣ Não, será minha primeira vez";

/// Plan-now question shown after the interest is collected.
pub fn plan_now_question(name: &str, interest: &str) -> String {
    format!(
        "✨ Excelente escolha, {name}! Entendi que você se interessa por {interest}.\n\n\
         Gostaria de planejar sua viagem personalizada agora?\n\n\
         1️⃣ Sim, vamos começar!\n\
         2️⃣ Não, apenas pesquisando por enquanto"
    )
}

/// Bare plan-now question, used as the re-prompt for invalid input.
pub fn plan_now_reprompt() -> String {
    "Gostaria de planejar sua viagem personalizada agora?\n\n\
     1️⃣ Sim, vamos começar!\n\
     2️⃣ Não, apenas pesquisando por enquanto"
        .to_string()
}

pub fn just_browsing(name: &str) -> String {
    format!(
        "Sem problemas, {name}! Quando desejar planejar sua viagem, é só nos avisar.\n\n\
         Digite 'menu' para ver as opções novamente quando estiver pronto."
    )
}

pub fn intake_complete(name: &str, method: &str, time: &str) -> String {
    format!(
        "✅ Perfeito, {name}! Seus dados foram registrados com sucesso.\n\n\
         Um de nossos especialistas entrará em contato em breve conforme sua preferência \
         ({method} no horário {time}).\n\n\
         Obrigado por escolher a Travessia dos Sonhos para sua próxima aventura marítima! 🚢✨"
    )
}

pub fn technical_difficulty(name: Option<&str>) -> String {
    format!(
        "⚠️ {}, desculpe, tivemos um probleminha técnico. Pode tentar novamente em instantes?",
        name.unwrap_or("Olá")
    )
}

/// Canned recovery reply when the generative fallback itself fails.
pub fn fallback_unavailable(name: Option<&str>) -> String {
    match name {
        Some(n) => format!(
            "{n}, para continuar nossa conversa, você pode digitar 'menu' para ver as opções disponíveis."
        ),
        None => "Para começarmos nossa conversa, digite 'oi' ou 'olá'.".to_string(),
    }
}

// ── Knowledge base ──────────────────────────────────────────────────

/// Topic/answer pairs fed verbatim to the generative fallback prompt.
pub const KNOWLEDGE_BASE: &[(&str, &str)] = &[
    (
        "Informações sobre cruzeiros",
        "Os cruzeiros marítimos são uma forma única de viajar que combina hospedagem, \
         alimentação, entretenimento e transporte em um único pacote. Durante a viagem, \
         você pode visitar múltiplos destinos sem precisar desfazer malas.",
    ),
    (
        "Cabines",
        "Os navios oferecem diferentes tipos de cabines: internas (sem janela), \
         externas (com janela), cabines com varanda e suítes. O preço varia conforme \
         a categoria, localização e tamanho.",
    ),
    (
        "Destinos populares",
        "Os destinos mais procurados incluem Brasil (costa brasileira), Caribe, Bahamas, Mediterrâneo, Europa, \
         Alasca, América do Sul e Ásia. Cada região tem sua temporada ideal para navegação.",
    ),
    (
        "Temporadas",
        "Brasil: ano todo (melhor de novembro a março). Mediterrâneo: abril a outubro. \
         Caribe: ano todo (alta temporada de dezembro a março). \
         Alasca: maio a setembro. América do Sul: novembro a março.",
    ),
    (
        "Duração",
        "Mini-cruzeiros: 3-5 dias. Cruzeiros padrão: 6-9 dias. Cruzeiros estendidos: 10-14 dias. \
         Grand Voyages: 15+ dias.",
    ),
    (
        "Documentação",
        "Para cruzeiros internacionais, é necessário passaporte válido (mínimo 6 meses). \
         Alguns destinos podem exigir visto. Recomendamos verificar requisitos específicos \
         para cada itinerário.",
    ),
    (
        "Alimentação",
        "Os navios oferecem uma variedade de opções gastronômicas, desde buffets inclusos \
         até restaurantes de especialidades (alguns com taxa extra). Todas as refeições \
         principais são incluídas no valor da cabine.",
    ),
    (
        "Entretenimento",
        "A bordo você encontra shows, teatro, música ao vivo, cassino, festas temáticas, \
         atividades esportivas e muito mais. A programação diária oferece opções para todos os gostos.",
    ),
    (
        "Atividades para crianças",
        "Os navios possuem clubes infantis divididos por faixa etária, com atividades \
         supervisionadas, piscinas dedicadas, e em alguns casos, parques aquáticos e \
         simuladores de aventura.",
    ),
    (
        "Melhor época",
        "A escolha da melhor época depende do destino. Para economia, recomendamos \
         temporadas intermediárias quando o clima ainda é bom mas os preços são mais acessíveis.",
    ),
    (
        "Pagamentos e reservas",
        "Trabalhamos com diversas formas de pagamento incluindo cartão de crédito, \
         boleto, pix e parcelamento. Garantimos o melhor preço e condições especiais \
         para nossos clientes.",
    ),
];
