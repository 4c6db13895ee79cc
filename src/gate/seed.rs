//! Labelled questions the statistical classifier is trained on.

pub(super) const LEGAL: &[&str] = &[
    // standard
    "Как подать иск в суд в Беларуси?",
    "Какие документы нужны для развода в РБ?",
    "Как оформить трудовой договор по ТК РБ?",
    "Какие права у потребителя в Беларуси?",
    "Как обжаловать решение административного органа?",
    "Как составить исковое заявление?",
    "Сколько стоит госпошлина за подачу иска?",
    "Как взыскать алименты на ребенка?",
    "Как оспорить завещание?",
    "Какой срок исковой давности по договору займа?",
    "Как зарегистрировать брак в загсе?",
    "Как расторгнуть договор аренды квартиры?",
    "Что грозит за неуплату штрафа ГАИ?",
    "Как написать претензию продавцу?",
    "Как получить компенсацию морального вреда?",
    "Какие права у работника при сокращении?",
    "Как приватизировать квартиру?",
    "Как оформить доверенность у нотариуса?",
    "Какая ответственность за клевету?",
    "Как вернуть товар ненадлежащего качества?",
    // colloquial
    "Меня кинули с деньгами, что делать?",
    "Начальник не платит зарплату уже месяц",
    "Соседи шумят по ночам, как их утихомирить?",
    "Развожусь с мужем, он не дает денег на ребенка",
    "Купил телефон, а он сломался через неделю",
    "Меня уволили без предупреждения",
    "Банк списал деньги без моего согласия",
    "Врач сделал неправильную операцию",
    "Полиция задержала без причины",
    "Управляющая компания не делает ремонт",
    "Должник не возвращает деньги по расписке",
    "Продавец отказывается вернуть деньги за брак",
    "Арендодатель не возвращает залог",
    "Бывший муж не пускает к ребенку",
    "Застройщик сорвал сроки сдачи дома",
    "Мошенники оформили кредит на мое имя",
    // specialized
    "Эстоппель в гражданском праве",
    "Субсидиарная ответственность учредителей",
    "Виндикационный иск против добросовестного приобретателя",
    "Негаторный иск в отношении недвижимости",
    "Реституция при недействительности сделки",
    "Цессия требования по договору подряда",
    "Новация долга в обязательственном праве",
    "Суброгация в страховом праве",
    "Деликтная ответственность за причинение вреда",
    "Виндикация бездокументарных ценных бумаг",
    "Признание гражданина недееспособным",
    "Неосновательное обогащение и его возврат",
    "Кассационная жалоба в гражданском процессе",
    // foreign
    "Что такое habeas corpus?",
    "Принцип pacta sunt servanda",
    "Доктрина res ipsa loquitur",
    "Правило de minimis non curat lex",
    "Принцип ultra vires в корпоративном праве",
    "Что означает pro bono в юриспруденции?",
    "Концепция force majeure в договорах",
    "Принцип caveat emptor при покупке",
    "Доктрина respondeat superior",
    "Правило nemo dat quod non habet",
    "Форс-мажор как основание освобождения от ответственности",
    // contextual
    "Права человека в интернете",
    "Страхование жизни и здоровья",
    "Защита персональных данных",
    "Трудовые споры с работодателем",
    "Медицинская ответственность врачей",
    "Банковские услуги для бизнеса",
    "Как оформить наследство?",
    "Какие права у меня есть?",
    "Как защитить свои интересы?",
    "Что делать с долгами?",
    "Раздел имущества супругов",
    "Опека над несовершеннолетним",
    "Гарантийный ремонт и права покупателя",
    // regional
    "Как работает мировой суд в Минске?",
    "Особенности регистрации ИП в Гомеле",
    "Налоговые льготы в ПВТ",
    "Земельное законодательство в Брестской области",
    "Жилищные вопросы в Витебске",
    "Трудовое право в свободных экономических зонах",
    "Права потребителей в интернет-магазинах РБ",
    "Экологическое право в Гродненской области",
    "Как открыть ИП в Беларуси?",
    "Налоги для ремесленников в Могилеве",
    "Статья 1014 Гражданского кодекса РБ",
    "Прописка и регистрация по месту жительства в Минске",
    "Уголовная ответственность за мошенничество в РБ",
    "Административный штраф за парковку в Минске",
];

pub(super) const NON_LEGAL: &[&str] = &[
    // technical false positives
    "Как работает суд присяжных в кино?",
    "Права доступа к базе данных",
    "Как настроить права доступа к базе данных PostgreSQL?",
    "Ограничить права доступа к папке в Linux",
    "Права пользователя в базе данных MySQL",
    "Выдать права доступа к таблице SQL",
    "Защита растений от вредителей",
    "Договор с интернет-провайдером не работает",
    "Роутер провайдера не раздает интернет",
    "Налоговая декларация в Excel",
    "Формула в Excel для расчета процентов",
    "Трудовой стаж в компьютерной игре",
    "Права администратора в Windows",
    "Как получить права администратора в Linux?",
    "Наследование классов в программировании",
    "Множественное наследование классов в Python",
    "Наследование интерфейсов в Java",
    "Юридическая фирма ищет программиста",
    "Исключения в программировании на Java",
    "Конструктор класса в программировании",
    "Сериал про адвокатов посмотреть онлайн",
    "Фильм про суд присяжных",
    // everyday
    "Как приготовить борщ?",
    "Рецепт борща со свеклой",
    "Какая погода завтра?",
    "Какая погода будет в выходные?",
    "Как похудеть на 10 кг?",
    "Где скачать фильм?",
    "Как установить Windows?",
    "Что посмотреть в кино?",
    "Как готовить пиццу?",
    "Где купить телефон?",
    "Как изучить английский язык?",
    "Что делать при простуде?",
    "Где вкусно поесть в Минске?",
    "Как вырастить помидоры на даче?",
    "Посоветуйте книгу на вечер",
    "Как научиться играть на гитаре?",
    "Сколько калорий в яблоке?",
    "Как почистить ноутбук от пыли?",
    "Куда сходить с детьми в выходные?",
    "Какой телефон лучше купить?",
    "Как ухаживать за кошкой?",
    "Какие упражнения для спины?",
    "Как сварить гречку?",
    "Во сколько начинается матч?",
    "Как быстро выучить стихотворение?",
    "Какой фильм посмотреть вечером?",
    "Как связать шарф спицами?",
    "Как поменять колесо на машине?",
    "Лучший рецепт блинов",
    "Как избавиться от тли на огурцах?",
    // generic
    "Как подать документы?",
    "Что мне делать?",
    "Куда обращаться за помощью?",
    "Какие документы нужны?",
    "Сколько это стоит?",
    "Можно ли это сделать?",
    "Привет, как дела?",
    "Расскажи анекдот",
    "Кто ты?",
    "Что ты умеешь?",
    "Спасибо за помощь",
    "Помоги мне пожалуйста",
    "Который час?",
];
