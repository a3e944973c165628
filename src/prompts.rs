//! Prompt text for every LLM-backed analysis. All analyses demand pure JSON
//! output; the sanitizer still defends against fenced or annotated replies.

pub const SCENE_SYSTEM_MESSAGE: &str =
    "당신은 연극 대본 분석 전문가입니다. 대본의 내용을 깊이 있게 분석하여 구조적으로 설명해주세요.";

pub const TEXT_SYSTEM_MESSAGE: &str =
    "당신은 텍스트 분석 전문가입니다. 주어진 내용을 깊이 있게 분석하여 구조적으로 설명해주세요.";

pub const INCREMENTAL_SYSTEM_MESSAGE: &str =
    "당신은 텍스트 분석 전문가입니다. 기존 분석 결과를 보강하여 업데이트해주세요.";

/// Prompt for every chunk after the first of a chunked scene analysis.
pub const CONTINUATION_PROMPT: &str = "이전 분석을 이어서 계속해주세요.";

pub const SCENE_ANALYSIS_PROMPT: &str = r#"[중요: 순수 JSON만 출력하세요. 다른 텍스트나 설명을 포함하지 마세요. JSON.parse()로 파싱 가능해야 합니다]

다음 연극 대본의 장면을 분석하여 아래 JSON 형식으로 출력해주세요:

{
  "metadata": {
    "type": "발단/전개/절정/결말 중 하나",
    "duration": "예상 소요 시간(분)",
    "location": "장면의 배경"
  },
  "summary": "장면 전체 요약 (100자 이내)",
  "themes": ["장면의 주요 테마들"],
  "symbols": ["상징적 요소들"],
  "connections": [
    {
      "targetSceneId": "연결된 장면 ID",
      "type": "인과관계/병렬관계/대조관계 중 하나",
      "description": "연결 관계 설명"
    }
  ]
}

대본:"#;

pub const UNIT_ANALYSIS_PROMPT: &str = r#"[중요: 순수 JSON만 출력하세요. 다른 텍스트나 설명을 포함하지 마세요. JSON.parse()로 파싱 가능해야 합니다]

현재 장면을 핵심 unit으로 분석하여 JSON 형식으로 출력해주세요.
각 unit은 다음 기준들 중 하나 이상의 변화가 발생할 때 구분됩니다:
1. 등장인물의 등퇴장
2. 대화 주제의 큰 변화
3. 상황이나 감정의 중요한 전환점

{
  "units": [
    {
      "id": "unit1",
      "startLine": "unit이 시작되는 대사나 지시문의 라인 번호",
      "endLine": "unit이 끝나는 대사나 지시문의 라인 번호",
      "type": "entrance/exit/conversation/action/event",
      "characters": [
        {
          "name": "등장인물 이름",
          "action": "해당 unit에서의 주요 행동이나 역할",
          "emotion": "감정 상태"
        }
      ],
      "description": "unit의 간단한 설명",
      "significance": "setup/rising/climax/falling",
      "dialogueTopics": ["주요 대화 주제들의 배열"],
      "situationChange": "상황의 변화 설명",
      "mood": "unit의 분위기"
    }
  ]
}

대본:"#;

pub const PLOT_ANALYSIS_PROMPT: &str = r#"[중요: 순수 JSON만 출력하세요. 다른 텍스트나 설명을 포함하지 마세요. JSON.parse()로 파싱 가능해야 합니다]

전체 연극 대본을 분석하여 다음 형식의 JSON으로 출력해주세요:

{
  "mainPlot": "핵심 플롯을 명사형으로 요약",
  "subPlots": [
    "부차적 플롯 1",
    "부차적 플롯 2"
  ],
  "themes": [
    "주요 테마 1",
    "주요 테마 2"
  ],
  "structure": {
    "exposition": "인물과 배경의 소개",
    "development": "갈등의 전개",
    "climax": "절정의 순간",
    "conclusion": "문제의 해결"
  }
}

대본:"#;

pub const SETTINGS_ANALYSIS_PROMPT: &str = r#"다음 연극 대본에서 소품과 무대 설비를 분석하여 아래 JSON 형식으로 출력해주세요:

{
  "stage": {
    "mainBackground": "주 무대 배경 설명",
    "areas": [
      {
        "name": "구역 이름",
        "description": "해당 구역의 특징과 용도"
      }
    ]
  },
  "fixtures": [
    {
      "name": "설비 이름",
      "firstAppearance": "처음 등장하는 막과 장",
      "relatedCharacters": ["관련된 등장인물 이름들"],
      "stateChanges": [
        {
          "scene": "상태가 변하는 막과 장",
          "description": "상태 변화 설명"
        }
      ]
    }
  ],
  "props": [
    {
      "name": "소품 이름",
      "firstAppearance": "처음 등장하는 막과 장",
      "relatedCharacters": ["관련된 등장인물 이름들"],
      "stateChanges": [
        {
          "scene": "상태가 변하는 막과 장",
          "description": "상태 변화 설명"
        }
      ]
    }
  ]
}

대본:"#;

pub const DIRECTION_COMPLEXITY_SYSTEM: &str = "You are analyzing theatrical stage directions. Rate the complexity and time needed for this action on a scale of 1-5, where 1 is quick and simple, 5 is complex and time-consuming. Respond with the number only.";

pub const TRANSITION_COMPLEXITY_SYSTEM: &str = "You are a theater expert analyzing scene transitions. Rate the complexity of stage changes between scenes on a scale of 1-5, where 1 is minimal change and 5 is complete stage transformation. Respond with the number only.";

pub const TRAIT_ANALYSIS_PROMPT: &str = r#"Based on the following context about a character in a script, analyze:
1. Personality traits
2. Character arc/development
3. Relationships with other characters
4. Key motivations and conflicts

Please provide a concise analysis focusing on these aspects."#;
